use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::transportation_model::CapacityMode;
use crate::termination::Termination;
use crate::utils::EPSILON;

/// Settings of an optimization run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How ship capacity limits the flow
    pub capacity_mode: CapacityMode,
    /// Flows with an absolute value at or below this are not reported as routes
    pub flow_tolerance: f64,
    /// When to give up waiting for the solver
    pub termination: Termination,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            capacity_mode: CapacityMode::default(),
            flow_tolerance: EPSILON,
            termination: Termination::Never,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Config> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no run can use
    pub fn validate(&self) -> Result<()> {
        if !self.flow_tolerance.is_finite() || self.flow_tolerance < 0.0 {
            return Err(Error::Input(format!(
                "flow tolerance must be a non-negative number, got {}",
                self.flow_tolerance
            )));
        }
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Config> {
        let json = std::fs::read_to_string(path)?;
        Config::from_json(&json)
    }
}
