pub mod config;
pub mod costs;
pub mod error;
pub mod models;
pub mod parse;
pub mod problem;
pub mod report;
pub mod runner;
pub mod termination;
pub mod utils;

pub use config::Config;
pub use costs::{CostSource, CostTable, PromptCostSource, RouteCosts};
pub use error::{Error, Result};
pub use models::transportation_model::{Allocation, CapacityMode, Route};
pub use problem::{Port, PortKind, Problem, Ship};
pub use runner::{optimize, RunHandle, Runner};
pub use termination::{CancellationToken, Termination};
