use std::fmt::Write as _;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::models::transportation_model::{Allocation, Route};
use crate::problem::Cost;

/// A persisted record of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: String,
    /// RFC 3339 timestamp of when the record was made
    pub created: String,
    pub total_cost: Cost,
    pub routes: Vec<Route>,
}

impl RunRecord {
    pub fn new(allocation: &Allocation) -> RunRecord {
        RunRecord {
            id: uuid::Uuid::new_v4().to_string(),
            created: chrono::Utc::now().to_rfc3339(),
            total_cost: allocation.total_cost(),
            routes: allocation.routes().to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        info!("Wrote run {} to {}", self.id, path.as_ref().display());
        Ok(())
    }
}

/// Renders the used routes as a Graphviz digraph, one edge per ship and route.
pub fn to_dot(allocation: &Allocation) -> String {
    let ports = allocation.ports();
    let mut out = String::from("digraph allocation {\n    rankdir=LR;\n");

    for i in 0..ports.supply.len() {
        let style = if ports.is_synthetic_supply(i) { ", style=dashed" } else { "" };
        // writing to a String never fails
        let _ = writeln!(out, "    s{} [label=\"Supply {}\", shape=box{}];", i, i + 1, style);
    }
    for j in 0..ports.demand.len() {
        let style = if ports.is_synthetic_demand(j) { ", style=dashed" } else { "" };
        let _ = writeln!(out, "    d{} [label=\"Demand {}\"{}];", j, j + 1, style);
    }
    for route in allocation.routes() {
        let _ = writeln!(
            out,
            "    s{} -> d{} [label=\"Ship {}: {}\", weight={}];",
            route.supply,
            route.demand,
            route.ship + 1,
            route.flow,
            route.flow
        );
    }

    out.push_str("}\n");
    out
}

/// The flow matrix of every ship, then one line per used route and the total cost
pub fn summary(allocation: &Allocation) -> String {
    let mut out = String::new();
    for ship in 0..allocation.dimensions().ships {
        let _ = writeln!(out, "Ship {}:", ship + 1);
        for row in allocation.ship(ship).rows() {
            let cells: Vec<String> = row.iter().map(|flow| format!("{:>8.2}", flow)).collect();
            let _ = writeln!(out, "{}", cells.join(" "));
        }
    }
    for route in allocation.routes() {
        let _ = writeln!(out, "{}", route);
    }
    let _ = writeln!(out, "Total cost: {}", allocation.total_cost());
    out
}
