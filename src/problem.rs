use derive_more::{Deref, Display, From, Into};
use serde::{Deserialize, Serialize};
use typed_index_collections::TiVec;

use crate::error::{Error, Result};

/// The type used for cargo quantities
pub type Quantity = f64;
/// The type used for cost.
pub type Cost = f64;

/// Sailing time assigned to ships entered without one.
pub const DEFAULT_SAILING_TIME: u32 = 10;

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Display)]
pub struct ShipIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Display)]
pub struct SupplyIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Display)]
pub struct DemandIndex(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    /// The maximum quantity the ship can carry
    capacity: u32,
    /// Fixed surcharge added to every route sailed by the ship
    fuel_cost: u32,
    /// Sailing time of a voyage. Carried along, but not used by the model
    #[serde(default = "default_sailing_time")]
    sailing_time: u32,
}

fn default_sailing_time() -> u32 {
    DEFAULT_SAILING_TIME
}

impl Ship {
    pub fn new(capacity: u32, fuel_cost: u32) -> Result<Ship> {
        Ship::with_sailing_time(capacity, fuel_cost, DEFAULT_SAILING_TIME)
    }

    pub fn with_sailing_time(capacity: u32, fuel_cost: u32, sailing_time: u32) -> Result<Ship> {
        let ship = Ship {
            capacity,
            fuel_cost,
            sailing_time,
        };
        ship.validate()?;
        Ok(ship)
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 || self.fuel_cost == 0 || self.sailing_time == 0 {
            return Err(Error::Input(format!(
                "ship capacity, fuel cost and sailing time must be positive, got {:?}",
                self
            )));
        }
        Ok(())
    }

    /// The maximum quantity the ship can carry
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Fixed surcharge added to every route sailed by the ship
    pub fn fuel_cost(&self) -> u32 {
        self.fuel_cost
    }

    pub fn sailing_time(&self) -> u32 {
        self.sailing_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Supply,
    Demand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    kind: PortKind,
    quantity: u32,
}

impl Port {
    pub fn new(kind: PortKind, quantity: u32) -> Result<Port> {
        if quantity == 0 {
            return Err(Error::Input(format!("{} quantity must be positive", kind)));
        }
        Ok(Port { kind, quantity })
    }

    pub fn supply(quantity: u32) -> Result<Port> {
        Port::new(PortKind::Supply, quantity)
    }

    pub fn demand(quantity: u32) -> Result<Port> {
        Port::new(PortKind::Demand, quantity)
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// A validated snapshot of the fleet and the ports it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProblem", into = "RawProblem")]
pub struct Problem {
    /// The ships available, ordered by insertion
    ships: TiVec<ShipIndex, Ship>,
    /// The supply ports, ordered by insertion
    supply: TiVec<SupplyIndex, Port>,
    /// The demand ports, ordered by insertion
    demand: TiVec<DemandIndex, Port>,
}

impl Problem {
    pub fn new(ships: Vec<Ship>, supply: Vec<Port>, demand: Vec<Port>) -> Result<Problem> {
        if ships.is_empty() {
            return Err(Error::Input("no ships configured".to_string()));
        }
        if supply.is_empty() {
            return Err(Error::Input("no supply ports configured".to_string()));
        }
        if demand.is_empty() {
            return Err(Error::Input("no demand ports configured".to_string()));
        }

        for ship in &ships {
            ship.validate()?;
        }

        let misplaced = supply
            .iter()
            .map(|p| (p, PortKind::Supply))
            .chain(demand.iter().map(|p| (p, PortKind::Demand)))
            .find(|(port, kind)| port.kind != *kind);
        if let Some((port, kind)) = misplaced {
            return Err(Error::Input(format!(
                "a {} port was listed among the {} ports",
                port.kind, kind
            )));
        }

        for port in supply.iter().chain(demand.iter()) {
            if port.quantity == 0 {
                return Err(Error::Input(format!(
                    "{} quantity must be positive",
                    port.kind
                )));
            }
        }

        Ok(Problem {
            ships: ships.into(),
            supply: supply.into(),
            demand: demand.into(),
        })
    }

    /// Builds a problem directly from the quantities of each port.
    pub fn from_quantities(ships: Vec<Ship>, supply: &[u32], demand: &[u32]) -> Result<Problem> {
        let supply = supply
            .iter()
            .map(|&q| Port::supply(q))
            .collect::<Result<Vec<_>>>()?;
        let demand = demand
            .iter()
            .map(|&q| Port::demand(q))
            .collect::<Result<Vec<_>>>()?;
        Problem::new(ships, supply, demand)
    }

    /// The ships available. Ordered by index (continuous, starting at 0)
    pub fn ships(&self) -> &TiVec<ShipIndex, Ship> {
        &self.ships
    }

    pub fn supply_ports(&self) -> &TiVec<SupplyIndex, Port> {
        &self.supply
    }

    pub fn demand_ports(&self) -> &TiVec<DemandIndex, Port> {
        &self.demand
    }

    pub fn supply_quantities(&self) -> Vec<Quantity> {
        self.supply.iter().map(|p| p.quantity as Quantity).collect()
    }

    pub fn demand_quantities(&self) -> Vec<Quantity> {
        self.demand.iter().map(|p| p.quantity as Quantity).collect()
    }

    pub fn capacities(&self) -> Vec<Quantity> {
        self.ships.iter().map(|s| s.capacity as Quantity).collect()
    }

    pub fn fuel_costs(&self) -> Vec<Cost> {
        self.ships.iter().map(|s| s.fuel_cost as Cost).collect()
    }

    /// The shape (ships, supply ports, demand ports) of the unbalanced problem
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.ships.len(), self.supply.len(), self.demand.len())
    }
}

/// The on-disk layout of a problem, where ports are plain quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawProblem {
    ships: Vec<Ship>,
    supply: Vec<u32>,
    demand: Vec<u32>,
}

impl TryFrom<RawProblem> for Problem {
    type Error = Error;

    fn try_from(raw: RawProblem) -> Result<Problem> {
        Problem::from_quantities(raw.ships, &raw.supply, &raw.demand)
    }
}

impl From<Problem> for RawProblem {
    fn from(problem: Problem) -> RawProblem {
        RawProblem {
            ships: problem.ships.raw,
            supply: problem.supply.iter().map(|p| p.quantity).collect(),
            demand: problem.demand.iter().map(|p| p.quantity).collect(),
        }
    }
}
