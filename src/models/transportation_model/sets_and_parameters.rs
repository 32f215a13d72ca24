use itertools::iproduct;
use log::{debug, trace};
use ndarray::Array3;

use crate::costs::RouteCosts;
use crate::error::{Error, Result};
use crate::problem::{Cost, Problem, Quantity};

/// Which side of the problem received the synthetic port, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synthetic {
    /// Supply and demand were already equal
    None,
    /// A supply port was appended to cover unmet demand
    Supply,
    /// A demand port was appended to absorb excess supply
    Demand,
}

/// Supply and demand quantities after balancing.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedPorts {
    pub supply: Vec<Quantity>,
    pub demand: Vec<Quantity>,
    pub synthetic: Synthetic,
}

impl BalancedPorts {
    /// Whether the given balanced supply index is the synthetic port
    pub fn is_synthetic_supply(&self, supply: usize) -> bool {
        self.synthetic == Synthetic::Supply && supply + 1 == self.supply.len()
    }

    /// Whether the given balanced demand index is the synthetic port
    pub fn is_synthetic_demand(&self, demand: usize) -> bool {
        self.synthetic == Synthetic::Demand && demand + 1 == self.demand.len()
    }

    pub fn is_synthetic_route(&self, supply: usize, demand: usize) -> bool {
        self.is_synthetic_supply(supply) || self.is_synthetic_demand(demand)
    }

    pub fn total(&self) -> Quantity {
        self.supply.iter().sum()
    }
}

/// Equalises total supply and total demand by appending the shortfall to the short side.
pub fn balance(supply: &[Quantity], demand: &[Quantity]) -> Result<BalancedPorts> {
    if supply.is_empty() || demand.is_empty() {
        return Err(Error::Input(
            "at least one supply port and one demand port are required".to_string(),
        ));
    }

    let total_supply: Quantity = supply.iter().sum();
    let total_demand: Quantity = demand.iter().sum();

    let mut supply = supply.to_vec();
    let mut demand = demand.to_vec();

    let synthetic = if total_supply > total_demand {
        demand.push(total_supply - total_demand);
        Synthetic::Demand
    } else if total_demand > total_supply {
        supply.push(total_demand - total_supply);
        Synthetic::Supply
    } else {
        Synthetic::None
    };

    debug!(
        "Balanced ports: supply = {}, demand = {}, synthetic = {:?}",
        total_supply, total_demand, synthetic
    );

    Ok(BalancedPorts {
        supply,
        demand,
        synthetic,
    })
}

/// Sizes of the balanced model, and the fixed mapping from (ship, supply, demand) to a variable index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub ships: usize,
    pub supply: usize,
    pub demand: usize,
}

impl Dimensions {
    pub fn new(ships: usize, supply: usize, demand: usize) -> Dimensions {
        Dimensions {
            ships,
            supply,
            demand,
        }
    }

    /// The number of variables, one per (ship, supply, demand) triple
    pub fn vars(&self) -> usize {
        self.ships * self.supply * self.demand
    }

    /// The number of variables belonging to a single ship
    pub fn vars_per_ship(&self) -> usize {
        self.supply * self.demand
    }

    /// The flat variable index of a route. Every row of the model addresses variables through this.
    pub fn index(&self, ship: usize, supply: usize, demand: usize) -> usize {
        ship * self.vars_per_ship() + supply * self.demand + demand
    }

    /// Inverse of `index`
    pub fn triple(&self, index: usize) -> (usize, usize, usize) {
        let ship = index / self.vars_per_ship();
        let rest = index % self.vars_per_ship();
        (ship, rest / self.demand, rest % self.demand)
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.ships, self.supply, self.demand)
    }

    /// All (ship, supply, demand) triples in variable order
    pub fn triples(&self) -> impl Iterator<Item = (usize, usize, usize)> {
        iproduct!(0..self.ships, 0..self.supply, 0..self.demand)
    }
}

/// parameters for the transportation model
#[derive(Debug, Clone)]
pub struct Parameters {
    pub dimensions: Dimensions,
    /// Balanced supply and demand quantities
    pub ports: BalancedPorts,
    /// Capacity of each ship
    pub capacity: Vec<Quantity>,
    /// Fuel cost of each ship, added to every one of its routes
    pub fuel_cost: Vec<Cost>,
    /// Total cost of a unit on route (ship, supply, demand) in the balanced dimensions
    pub cost: Array3<Cost>,
}

impl Parameters {
    /// Balances the ports of `problem` and builds the cost tensor from the collected route costs
    pub fn new(problem: &Problem, costs: &RouteCosts) -> Result<Parameters> {
        let ports = balance(&problem.supply_quantities(), &problem.demand_quantities())?;
        Parameters::with_ports(ports, problem.capacities(), problem.fuel_costs(), costs)
    }

    pub fn with_ports(
        ports: BalancedPorts,
        capacity: Vec<Quantity>,
        fuel_cost: Vec<Cost>,
        costs: &RouteCosts,
    ) -> Result<Parameters> {
        if ports.supply.is_empty() || ports.demand.is_empty() {
            return Err(Error::Input(
                "at least one supply port and one demand port are required".to_string(),
            ));
        }
        let dimensions = Dimensions::new(capacity.len(), ports.supply.len(), ports.demand.len());
        if dimensions.ships == 0 {
            return Err(Error::Input("no ships configured".to_string()));
        }
        if fuel_cost.len() != dimensions.ships {
            return Err(Error::dimension_mismatch(
                "fuel costs",
                [dimensions.ships],
                [fuel_cost.len()],
            ));
        }

        let cost = cost_tensor(&ports, &fuel_cost, costs)?;
        trace!("cost tensor: {:?}", cost);

        Ok(Parameters {
            dimensions,
            ports,
            capacity,
            fuel_cost,
            cost,
        })
    }
}

/// total_cost[v][i][j] = transport_cost(v, i, j) + fuel_cost[v], with no transport cost on
/// routes touching the synthetic port.
pub fn cost_tensor(
    ports: &BalancedPorts,
    fuel_cost: &[Cost],
    costs: &RouteCosts,
) -> Result<Array3<Cost>> {
    let (v, s, d) = (fuel_cost.len(), ports.supply.len(), ports.demand.len());
    if s == 0 || d == 0 {
        return Err(Error::dimension_mismatch("balanced ports", [1, 1], [s, d]));
    }

    // Route costs cover the real ports only
    let real = (
        v,
        s - ports.is_synthetic_supply(s - 1) as usize,
        d - ports.is_synthetic_demand(d - 1) as usize,
    );
    if costs.shape() != real {
        return Err(Error::dimension_mismatch(
            "route costs",
            [real.0, real.1, real.2],
            [costs.shape().0, costs.shape().1, costs.shape().2],
        ));
    }

    let mut tensor = Array3::zeros((v, s, d));
    for (ship, supply, demand) in iproduct!(0..v, 0..s, 0..d) {
        let transport = if ports.is_synthetic_route(supply, demand) {
            0.0
        } else {
            costs.get(ship, supply, demand)
        };

        if !transport.is_finite() || transport < 0.0 {
            return Err(Error::InvalidCost(format!(
                "cost {} for ship {}, port {} -> port {}",
                transport,
                ship + 1,
                supply + 1,
                demand + 1
            )));
        }

        tensor[[ship, supply, demand]] = transport + fuel_cost[ship];
    }

    Ok(tensor)
}
