use std::io::{BufRead, Write};

use itertools::iproduct;
use log::{debug, trace};
use ndarray::Array3;

use crate::error::{Error, Result};
use crate::problem::{Cost, DemandIndex, Problem, ShipIndex, SupplyIndex};

/// Supplies the transport cost of moving cargo from a supply port to a demand port with a given ship.
/// Only asked about real ports, never about the synthetic port added while balancing.
pub trait CostSource {
    fn transport_cost(
        &mut self,
        ship: ShipIndex,
        supply: SupplyIndex,
        demand: DemandIndex,
    ) -> Option<Cost>;
}

impl<F> CostSource for F
where
    F: FnMut(ShipIndex, SupplyIndex, DemandIndex) -> Option<Cost>,
{
    fn transport_cost(
        &mut self,
        ship: ShipIndex,
        supply: SupplyIndex,
        demand: DemandIndex,
    ) -> Option<Cost> {
        self(ship, supply, demand)
    }
}

/// A dense table of costs indexed `[ship][supply][demand]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CostTable(pub Vec<Vec<Vec<Cost>>>);

impl CostSource for CostTable {
    fn transport_cost(
        &mut self,
        ship: ShipIndex,
        supply: SupplyIndex,
        demand: DemandIndex,
    ) -> Option<Cost> {
        self.0
            .get(*ship)
            .and_then(|s| s.get(*supply))
            .and_then(|d| d.get(*demand))
            .copied()
    }
}

/// Asks for every cost on a line-oriented reader, writing one prompt per route.
pub struct PromptCostSource<R, W> {
    input: R,
    prompt: W,
}

impl<R: BufRead, W: Write> PromptCostSource<R, W> {
    pub fn new(input: R, prompt: W) -> Self {
        PromptCostSource { input, prompt }
    }
}

impl<R: BufRead, W: Write> CostSource for PromptCostSource<R, W> {
    fn transport_cost(
        &mut self,
        ship: ShipIndex,
        supply: SupplyIndex,
        demand: DemandIndex,
    ) -> Option<Cost> {
        write!(
            self.prompt,
            "Ship {}, Port {} -> Port {}: ",
            *ship + 1,
            *supply + 1,
            *demand + 1
        )
        .ok()?;
        self.prompt.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => line.trim().parse::<i64>().ok().map(|c| c as Cost),
        }
    }
}

/// The transport costs of every real route, gathered before the model is built.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteCosts(Array3<Cost>);

impl RouteCosts {
    /// Asks `source` once for each (ship, supply, demand) triple of `problem`, in row-major order.
    pub fn collect(problem: &Problem, source: &mut impl CostSource) -> Result<RouteCosts> {
        let (v, s, d) = problem.shape();
        debug!("Collecting {} route costs", v * s * d);

        let mut costs = Array3::zeros((v, s, d));
        for (ship, supply, demand) in iproduct!(0..v, 0..s, 0..d) {
            let cost = source
                .transport_cost(ship.into(), supply.into(), demand.into())
                .ok_or_else(|| {
                    Error::InvalidCost(format!(
                        "no cost given for ship {}, port {} -> port {}",
                        ship + 1,
                        supply + 1,
                        demand + 1
                    ))
                })?;
            if !cost.is_finite() || cost < 0.0 {
                return Err(Error::InvalidCost(format!(
                    "cost {} for ship {}, port {} -> port {} is not a non-negative number",
                    cost,
                    ship + 1,
                    supply + 1,
                    demand + 1
                )));
            }
            trace!("cost[{ship}][{supply}][{demand}] = {cost}");
            costs[[ship, supply, demand]] = cost;
        }

        RouteCosts::from_array(costs)
    }

    /// Wraps an already gathered cost tensor, rejecting negative and non-finite costs.
    pub fn from_array(costs: Array3<Cost>) -> Result<RouteCosts> {
        if let Some(((ship, supply, demand), cost)) = costs
            .indexed_iter()
            .find(|(_, c)| !c.is_finite() || **c < 0.0)
        {
            return Err(Error::InvalidCost(format!(
                "cost {} for ship {}, port {} -> port {} is not a non-negative number",
                cost,
                ship + 1,
                supply + 1,
                demand + 1
            )));
        }
        Ok(RouteCosts(costs))
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.0.dim()
    }

    pub fn get(&self, ship: usize, supply: usize, demand: usize) -> Cost {
        self.0[[ship, supply, demand]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Ship;

    fn problem() -> Problem {
        let ships = vec![Ship::new(10, 1).unwrap(), Ship::new(20, 2).unwrap()];
        Problem::from_quantities(ships, &[5, 5], &[10]).unwrap()
    }

    #[test]
    fn collects_in_row_major_order() {
        let mut asked = Vec::new();
        let mut source = |v: ShipIndex, i: SupplyIndex, j: DemandIndex| {
            asked.push((*v, *i, *j));
            Some((*v * 100 + *i * 10 + *j) as Cost)
        };
        let costs = RouteCosts::collect(&problem(), &mut source).unwrap();

        assert_eq!(asked, vec![(0, 0, 0), (0, 1, 0), (1, 0, 0), (1, 1, 0)]);
        assert_eq!(costs.shape(), (2, 2, 1));
        assert_eq!(costs.get(1, 1, 0), 110.0);
    }

    #[test]
    fn rejects_missing_and_negative_costs() {
        let mut missing = CostTable(vec![vec![vec![1.0], vec![1.0]]]);
        match RouteCosts::collect(&problem(), &mut missing) {
            Err(Error::InvalidCost(msg)) => assert!(msg.contains("ship 2")),
            other => panic!("expected invalid cost, got {:?}", other),
        }

        let mut negative = |_: ShipIndex, i: SupplyIndex, _: DemandIndex| {
            Some(if *i == 1 { -3.0 } else { 1.0 })
        };
        assert!(matches!(
            RouteCosts::collect(&problem(), &mut negative),
            Err(Error::InvalidCost(_))
        ));
    }

    #[test]
    fn prompts_once_per_route() {
        let input = "4\n7\nnot a number\n";
        let mut output = Vec::new();
        let mut source = PromptCostSource::new(input.as_bytes(), &mut output);

        assert_eq!(source.transport_cost(0.into(), 0.into(), 0.into()), Some(4.0));
        assert_eq!(source.transport_cost(0.into(), 1.into(), 0.into()), Some(7.0));
        assert_eq!(source.transport_cost(1.into(), 0.into(), 0.into()), None);
        assert_eq!(source.transport_cost(1.into(), 1.into(), 0.into()), None);

        let prompts = String::from_utf8(output).unwrap();
        assert!(prompts.starts_with("Ship 1, Port 1 -> Port 1: Ship 1, Port 2 -> Port 1: "));
    }

    #[test]
    fn stops_asking_after_the_first_negative_answer() {
        let input = "-5\n1\n1\n1\n";
        let mut output = Vec::new();
        let mut source = PromptCostSource::new(input.as_bytes(), &mut output);

        match RouteCosts::collect(&problem(), &mut source) {
            Err(Error::InvalidCost(msg)) => assert!(msg.contains("ship 1, port 1 -> port 1")),
            other => panic!("expected invalid cost, got {:?}", other),
        }
        let prompts = String::from_utf8(output).unwrap();
        assert_eq!(prompts.matches("Ship ").count(), 1);
    }
}
