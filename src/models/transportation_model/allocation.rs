use log::debug;
use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::model::SolutionResult;
use super::sets_and_parameters::{BalancedPorts, Dimensions};
use crate::error::{Error, Result};
use crate::problem::{Cost, Quantity};

/// A route that actually carries cargo. Indices are 0-based positions in the balanced model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub ship: usize,
    pub supply: usize,
    pub demand: usize,
    pub flow: Quantity,
    /// The flat variable index of the route
    pub index: usize,
    /// Whether the route touches the synthetic balancing port
    pub synthetic: bool,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ship {}, Port {} -> Port {} -> {} (index {})",
            self.ship + 1,
            self.supply + 1,
            self.demand + 1,
            self.flow,
            self.index
        )?;
        if self.synthetic {
            write!(f, " [balancing]")?;
        }
        Ok(())
    }
}

/// The optimal flows reshaped to (ship, supply, demand), together with the routes in use.
#[derive(Debug, Clone)]
pub struct Allocation {
    flows: Array3<Quantity>,
    ports: BalancedPorts,
    routes: Vec<Route>,
    total_cost: Cost,
}

impl Allocation {
    /// Interprets the outcome of a solve. Unsuccessful results become `InfeasibleOrUnbounded`.
    pub fn interpret(
        result: &SolutionResult,
        dimensions: Dimensions,
        ports: &BalancedPorts,
        tolerance: f64,
    ) -> Result<Allocation> {
        match (result.success, &result.flows, result.total_cost) {
            (true, Some(flows), Some(total_cost)) => {
                Allocation::from_flows(flows.clone(), dimensions, ports.clone(), total_cost, tolerance)
            }
            _ => Err(Error::InfeasibleOrUnbounded(result.message.clone())),
        }
    }

    pub fn from_flows(
        flows: Vec<Quantity>,
        dimensions: Dimensions,
        ports: BalancedPorts,
        total_cost: Cost,
        tolerance: f64,
    ) -> Result<Allocation> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::Input(format!(
                "flow tolerance must be a non-negative number, got {}",
                tolerance
            )));
        }
        if flows.len() != dimensions.vars() {
            return Err(Error::dimension_mismatch(
                "solution vector",
                [dimensions.vars()],
                [flows.len()],
            ));
        }
        if ports.supply.len() != dimensions.supply || ports.demand.len() != dimensions.demand {
            return Err(Error::dimension_mismatch(
                "balanced ports",
                [dimensions.supply, dimensions.demand],
                [ports.supply.len(), ports.demand.len()],
            ));
        }

        let routes = flows
            .iter()
            .enumerate()
            .filter(|(_, flow)| flow.abs() > tolerance)
            .map(|(index, &flow)| {
                let (ship, supply, demand) = dimensions.triple(index);
                Route {
                    ship,
                    supply,
                    demand,
                    flow,
                    index,
                    synthetic: ports.is_synthetic_route(supply, demand),
                }
            })
            .collect::<Vec<_>>();

        debug!("{} of {} routes in use", routes.len(), flows.len());

        let flows = Array3::from_shape_vec(dimensions.shape(), flows).map_err(|_| {
            Error::dimension_mismatch("solution vector", [dimensions.vars()], [0])
        })?;

        Ok(Allocation {
            flows,
            ports,
            routes,
            total_cost,
        })
    }

    /// Flows indexed `[ship, supply, demand]` over the balanced ports
    pub fn flows(&self) -> &Array3<Quantity> {
        &self.flows
    }

    /// Flows of a single ship, indexed `[supply, demand]`
    pub fn ship(&self, ship: usize) -> ArrayView2<'_, Quantity> {
        self.flows.index_axis(Axis(0), ship)
    }

    /// The routes carrying cargo, in variable order
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The routes between real ports only
    pub fn real_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| !r.synthetic)
    }

    pub fn total_cost(&self) -> Cost {
        self.total_cost
    }

    pub fn ports(&self) -> &BalancedPorts {
        &self.ports
    }

    pub fn dimensions(&self) -> Dimensions {
        let (ships, supply, demand) = self.flows.dim();
        Dimensions::new(ships, supply, demand)
    }

    /// Total quantity leaving each balanced supply port
    pub fn shipped(&self) -> Vec<Quantity> {
        self.flows.sum_axis(Axis(2)).sum_axis(Axis(0)).to_vec()
    }

    /// Total quantity arriving at each balanced demand port
    pub fn delivered(&self) -> Vec<Quantity> {
        self.flows.sum_axis(Axis(1)).sum_axis(Axis(0)).to_vec()
    }

    /// Total quantity carried by each ship, synthetic routes excluded
    pub fn carried(&self) -> Vec<Quantity> {
        let mut carried = vec![0.0; self.flows.dim().0];
        for route in self.real_routes() {
            carried[route.ship] += route.flow;
        }
        carried
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transportation_model::model::SolveStatus;
    use crate::models::transportation_model::sets_and_parameters::balance;

    fn success(flows: Vec<f64>, total_cost: f64) -> SolutionResult {
        SolutionResult {
            success: true,
            status: SolveStatus::Optimal,
            flows: Some(flows),
            total_cost: Some(total_cost),
            message: String::new(),
        }
    }

    #[test]
    fn reshapes_and_extracts_routes() {
        let ports = balance(&[40.0], &[25.0]).unwrap();
        let dims = Dimensions::new(2, 1, 2);
        let result = success(vec![25.0, 0.0, 0.0, 15.0], 100.0);

        let allocation = Allocation::interpret(&result, dims, &ports, 1e-9).unwrap();
        assert_eq!(allocation.flows()[[0, 0, 0]], 25.0);
        assert_eq!(allocation.flows()[[1, 0, 1]], 15.0);
        assert_eq!(allocation.ship(1), ndarray::arr2(&[[0.0f64, 15.0]]));

        let routes = allocation.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!((routes[0].ship, routes[0].supply, routes[0].demand), (0, 0, 0));
        assert!(!routes[0].synthetic);
        assert_eq!((routes[1].ship, routes[1].demand, routes[1].index), (1, 1, 3));
        assert!(routes[1].synthetic);
        assert_eq!(allocation.real_routes().count(), 1);

        assert_eq!(allocation.shipped(), vec![40.0]);
        assert_eq!(allocation.delivered(), vec![25.0, 15.0]);
        assert_eq!(allocation.carried(), vec![25.0, 0.0]);
        assert_eq!(routes[1].to_string(), "Ship 2, Port 1 -> Port 2 -> 15 (index 3) [balancing]");
    }

    #[test]
    fn tolerance_filters_noise() {
        let ports = balance(&[1.0], &[1.0]).unwrap();
        let dims = Dimensions::new(2, 1, 1);

        let noisy = Allocation::from_flows(vec![1.0, 1e-12], dims, ports.clone(), 1.0, 1e-9).unwrap();
        assert_eq!(noisy.routes().len(), 1);

        let strict = Allocation::from_flows(vec![1.0, 1e-12], dims, ports.clone(), 1.0, 0.0).unwrap();
        assert_eq!(strict.routes().len(), 2);

        let unused = Allocation::from_flows(vec![1.0, 0.0], dims, ports.clone(), 1.0, 0.0).unwrap();
        assert_eq!(unused.routes().len(), 1);
    }

    #[test]
    fn rejects_negative_or_nan_tolerance() {
        let ports = balance(&[1.0], &[1.0]).unwrap();
        let dims = Dimensions::new(2, 1, 1);
        for tolerance in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Allocation::from_flows(vec![1.0, 0.0], dims, ports.clone(), 1.0, tolerance),
                Err(Error::Input(_))
            ));
        }
    }

    #[test]
    fn failures_become_errors() {
        let ports = balance(&[1.0], &[1.0]).unwrap();
        let dims = Dimensions::new(1, 1, 1);
        let failed = SolutionResult {
            success: false,
            status: SolveStatus::Infeasible,
            flows: None,
            total_cost: None,
            message: "problem is infeasible".to_string(),
        };
        match Allocation::interpret(&failed, dims, &ports, 0.0) {
            Err(Error::InfeasibleOrUnbounded(msg)) => assert_eq!(msg, "problem is infeasible"),
            other => panic!("expected failure, got {:?}", other),
        }

        let short = success(vec![1.0, 2.0], 1.0);
        assert!(matches!(
            Allocation::interpret(&short, dims, &ports, 0.0),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
