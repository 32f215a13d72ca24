use std::path::Path;
use std::str::FromStr;

use derive_more::Display;
use log::{debug, info};
use serde::{Deserialize, Deserializer};

use crate::costs::{CostTable, RouteCosts};
use crate::error::{Error, Result};
use crate::problem::{Cost, Problem, Ship};
use crate::termination::Termination;

#[derive(Debug, Display, PartialEq, Eq)]
pub enum ParseTerminationError {
    ExpectedInt,
    ExpectedTerm,
    UnconsumedTokens,
    EmptyStack,
    UnrecognizedToken(String),
}

impl std::error::Error for ParseTerminationError {}

impl<'s> std::convert::TryFrom<&'s str> for Termination {
    type Error = ParseTerminationError;

    fn try_from(value: &'s str) -> std::result::Result<Self, Self::Error> {
        use ParseTerminationError::*;
        let tokens = value.split_ascii_whitespace();

        enum Arg {
            Int(u64),
            Term(Box<Termination>),
        }

        let mut stack = Vec::new();

        let int = |s: &mut Vec<Arg>| match s.pop() {
            Some(Arg::Int(x)) => Ok(x),
            Some(Arg::Term(_)) => Err(ExpectedInt),
            None => Err(EmptyStack),
        };

        let term = |s: &mut Vec<Arg>| match s.pop() {
            Some(Arg::Term(x)) => Ok(x),
            Some(Arg::Int(_)) => Err(ExpectedTerm),
            None => Err(EmptyStack),
        };

        for token in tokens {
            debug!("token = {token}");
            let new = match token {
                "never" => Arg::Term(Box::new(Termination::Never)),
                "timeout" => Arg::Term(Box::new(Termination::Timeout(
                    std::time::Duration::from_secs(int(&mut stack)?),
                ))),
                "|" => Arg::Term(Box::new(Termination::Any(
                    term(&mut stack)?,
                    term(&mut stack)?,
                ))),
                "&" => Arg::Term(Box::new(Termination::All(
                    term(&mut stack)?,
                    term(&mut stack)?,
                ))),
                x => match x.parse::<u64>() {
                    Ok(num) => Arg::Int(num),
                    Err(_) => return Err(UnrecognizedToken(x.to_string())),
                },
            };

            stack.push(new);
        }

        let result = term(&mut stack).map(|x| *x)?;
        match stack.is_empty() {
            true => Ok(result),
            false => Err(UnconsumedTokens),
        }
    }
}

impl FromStr for Termination {
    type Err = ParseTerminationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Termination::try_from(s)
    }
}

impl<'de> Deserialize<'de> for Termination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Termination::try_from(raw.as_str()).map_err(serde::de::Error::custom)
    }
}

/// An instance file: the fleet, the ports and optionally the cost of every route.
#[derive(Debug, Clone, Deserialize)]
struct RawInstance {
    ships: Vec<Ship>,
    supply: Vec<u32>,
    demand: Vec<u32>,
    /// Costs indexed `[ship][supply][demand]` over the ports listed above
    #[serde(default)]
    costs: Option<Vec<Vec<Vec<Cost>>>>,
}

pub struct Instance {
    pub name: String,
    pub problem: Problem,
    pub costs: Option<RouteCosts>,
}

impl Instance {
    pub fn from_json(name: &str, json: &str) -> Result<Instance> {
        let raw: RawInstance = serde_json::from_str(json)?;
        let problem = Problem::from_quantities(raw.ships, &raw.supply, &raw.demand)?;

        let costs = match raw.costs {
            Some(table) => Some(cost_array(&problem, table)?),
            None => None,
        };

        Ok(Instance {
            name: name.to_string(),
            problem,
            costs,
        })
    }
}

/// Turns a nested cost table into a cost tensor, checking it covers every route of `problem` exactly
fn cost_array(problem: &Problem, table: Vec<Vec<Vec<Cost>>>) -> Result<RouteCosts> {
    let (v, s, d) = problem.shape();
    let actual = [
        table.len(),
        table.first().map_or(0, |t| t.len()),
        table.first().and_then(|t| t.first()).map_or(0, |t| t.len()),
    ];

    let regular = table.len() == v
        && table
            .iter()
            .all(|ship| ship.len() == s && ship.iter().all(|supply| supply.len() == d));
    if !regular {
        return Err(Error::InvalidCost(format!(
            "expected a {}x{}x{} cost table, got roughly {}x{}x{}",
            v, s, d, actual[0], actual[1], actual[2]
        )));
    }

    RouteCosts::collect(problem, &mut CostTable(table))
}

pub fn read_instance(path: impl AsRef<Path>) -> Result<Instance> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("instance");

    let json = std::fs::read_to_string(path)?;
    let instance = Instance::from_json(name, &json)?;
    info!(
        "Read instance {} with shape {:?}",
        instance.name,
        instance.problem.shape()
    );
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_termination_in_reverse_polish() {
        assert!(matches!(Termination::try_from("never"), Ok(Termination::Never)));
        assert!(matches!(
            Termination::try_from("30 timeout"),
            Ok(Termination::Timeout(d)) if d == Duration::from_secs(30)
        ));

        let combined: Termination = "never 5 timeout |".parse().unwrap();
        assert_eq!(combined.to_string(), "(5 timeout) | (never)");
    }

    #[test]
    fn rejects_malformed_termination() {
        assert_eq!(
            Termination::try_from("forever").unwrap_err(),
            ParseTerminationError::UnrecognizedToken("forever".to_string())
        );
        assert_eq!(
            Termination::try_from("timeout").unwrap_err(),
            ParseTerminationError::EmptyStack
        );
        assert_eq!(
            Termination::try_from("never timeout").unwrap_err(),
            ParseTerminationError::ExpectedInt
        );
        assert_eq!(
            Termination::try_from("never never").unwrap_err(),
            ParseTerminationError::UnconsumedTokens
        );
    }

    #[test]
    fn reads_instance_with_costs() {
        let json = r#"{
            "ships": [{"capacity": 100, "fuel_cost": 5}, {"capacity": 50, "fuel_cost": 2, "sailing_time": 4}],
            "supply": [40],
            "demand": [25, 10],
            "costs": [[[3, 4]], [[5, 6]]]
        }"#;
        let instance = Instance::from_json("demo", json).unwrap();
        assert_eq!(instance.problem.shape(), (2, 1, 2));
        let costs = instance.costs.unwrap();
        assert_eq!(costs.get(1, 0, 1), 6.0);
    }

    #[test]
    fn rejects_ragged_or_negative_costs() {
        let ragged = r#"{"ships": [{"capacity": 1, "fuel_cost": 1}], "supply": [1], "demand": [1, 1], "costs": [[[1]]]}"#;
        assert!(matches!(
            Instance::from_json("ragged", ragged),
            Err(Error::InvalidCost(_))
        ));

        let negative = r#"{"ships": [{"capacity": 1, "fuel_cost": 1}], "supply": [1], "demand": [1], "costs": [[[-1]]]}"#;
        assert!(matches!(
            Instance::from_json("negative", negative),
            Err(Error::InvalidCost(_))
        ));

        let no_ships = r#"{"ships": [], "supply": [1], "demand": [1]}"#;
        assert!(matches!(
            Instance::from_json("empty", no_ships),
            Err(Error::Input(_))
        ));
    }
}
