use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;

use super::sets_and_parameters::{Dimensions, Parameters};
use crate::error::{Error, Result};
use crate::models::utils::{AddVars, ConvertVars};
use crate::utils::approx_eq;
use itertools::iproduct;
use log::{debug, info, trace, warn};
use microlp::{ComparisonOp, OptimizationDirection, Problem};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// How ship capacity limits the flow of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityMode {
    /// Every single (ship, supply, demand) route carries at most the ship's capacity.
    /// A ship may use its full capacity on several routes at once.
    PerRoute,
    /// The sum of all routes of a ship carries at most the ship's capacity
    PerShipTotal,
}

impl Default for CapacityMode {
    fn default() -> Self {
        CapacityMode::PerRoute
    }
}

impl Display for CapacityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityMode::PerRoute => write!(f, "per-route"),
            CapacityMode::PerShipTotal => write!(f, "per-ship-total"),
        }
    }
}

impl FromStr for CapacityMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "per-route" => Ok(CapacityMode::PerRoute),
            "per-ship-total" => Ok(CapacityMode::PerShipTotal),
            x => Err(format!(
                "unknown capacity mode `{x}`, expected `per-route` or `per-ship-total`"
            )),
        }
    }
}

/// A sparse constraint matrix, stored as one list of (variable, coefficient) pairs per row.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintMatrix {
    cols: usize,
    rows: Vec<Vec<(usize, f64)>>,
}

impl ConstraintMatrix {
    pub fn new(cols: usize) -> ConstraintMatrix {
        ConstraintMatrix {
            cols,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<(usize, f64)>) -> Result<()> {
        if let Some(&(col, _)) = row.iter().find(|(col, _)| *col >= self.cols) {
            return Err(Error::dimension_mismatch(
                "constraint row",
                [self.cols],
                [col + 1],
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Vec<(usize, f64)>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The left hand side of every row evaluated at `x`
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&(col, coeff)| coeff * x[col]).sum())
            .collect()
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.rows.len(), self.cols));
        for (r, row) in self.rows.iter().enumerate() {
            for &(col, coeff) in row {
                dense[[r, col]] += coeff;
            }
        }
        dense
    }
}

/// The transportation problem as a linear program:
/// minimize objective · x subject to a_eq x = b_eq, a_ub x <= b_ub and bounds.
#[derive(Debug, Clone)]
pub struct LpModel {
    pub dimensions: Dimensions,
    pub objective: Vec<f64>,
    pub a_eq: ConstraintMatrix,
    pub b_eq: Vec<f64>,
    pub a_ub: ConstraintMatrix,
    pub b_ub: Vec<f64>,
    pub bounds: Vec<(f64, f64)>,
}

impl LpModel {
    /// builds the transportation model
    pub fn build(parameters: &Parameters, mode: CapacityMode) -> Result<LpModel> {
        let dims = parameters.dimensions;
        let (v, s, d) = dims.shape();

        if parameters.cost.dim() != dims.shape() {
            let (cv, cs, cd) = parameters.cost.dim();
            return Err(Error::dimension_mismatch(
                "cost tensor",
                [v, s, d],
                [cv, cs, cd],
            ));
        }
        if parameters.capacity.len() != v {
            return Err(Error::dimension_mismatch(
                "ship capacities",
                [v],
                [parameters.capacity.len()],
            ));
        }
        if parameters.ports.supply.len() != s || parameters.ports.demand.len() != d {
            return Err(Error::dimension_mismatch(
                "port quantities",
                [s, d],
                [parameters.ports.supply.len(), parameters.ports.demand.len()],
            ));
        }

        info!(
            "Building transportation model with {} ships, {} supply ports and {} demand ports",
            v, s, d
        );

        // standard layout, so iteration order is the row-major variable order
        let objective: Vec<f64> = parameters.cost.iter().copied().collect();

        // ******************** EQUALITY CONSTRAINTS ********************
        let mut a_eq = ConstraintMatrix::new(dims.vars());

        // everything available at a supply port is shipped
        for i in 0..s {
            let row = iproduct!(0..v, 0..d)
                .map(|(ship, j)| (dims.index(ship, i, j), 1.0))
                .collect();
            a_eq.push_row(row)?;
        }

        // everything requested at a demand port is delivered
        for j in 0..d {
            let row = iproduct!(0..v, 0..s)
                .map(|(ship, i)| (dims.index(ship, i, j), 1.0))
                .collect();
            a_eq.push_row(row)?;
        }

        let b_eq: Vec<f64> = parameters
            .ports
            .supply
            .iter()
            .chain(parameters.ports.demand.iter())
            .copied()
            .collect();

        // ******************** CAPACITY CONSTRAINTS ********************
        let mut a_ub = ConstraintMatrix::new(dims.vars());
        let mut b_ub = Vec::new();

        match mode {
            CapacityMode::PerRoute => {
                for (ship, i, j) in dims.triples() {
                    a_ub.push_row(vec![(dims.index(ship, i, j), 1.0)])?;
                    b_ub.push(parameters.capacity[ship]);
                }
            }
            CapacityMode::PerShipTotal => {
                // cargo "moved" to or from the synthetic port is not carried by anyone
                let ports = &parameters.ports;
                for ship in 0..v {
                    let row = iproduct!(0..s, 0..d)
                        .filter(|&(i, j)| !ports.is_synthetic_route(i, j))
                        .map(|(i, j)| (dims.index(ship, i, j), 1.0))
                        .collect();
                    a_ub.push_row(row)?;
                    b_ub.push(parameters.capacity[ship]);
                }
            }
        }

        let bounds = vec![(0.0, f64::INFINITY); dims.vars()];

        debug!(
            "Transportation model: {} variables, {} equality rows, {} capacity rows ({})",
            dims.vars(),
            a_eq.len(),
            a_ub.len(),
            mode
        );

        Ok(LpModel {
            dimensions: dims,
            objective,
            a_eq,
            b_eq,
            a_ub,
            b_ub,
            bounds,
        })
    }

    pub fn objective_value(&self, x: &[f64]) -> f64 {
        self.objective.iter().zip(x).map(|(c, x)| c * x).sum()
    }

    /// Whether `x` satisfies every row and bound of the model within `tolerance`
    pub fn is_feasible(&self, x: &[f64], tolerance: f64) -> bool {
        if x.len() != self.dimensions.vars() {
            return false;
        }

        let eq = self
            .a_eq
            .apply(x)
            .iter()
            .zip(&self.b_eq)
            .all(|(lhs, rhs)| approx_eq(*lhs, *rhs, tolerance));
        let ub = self
            .a_ub
            .apply(x)
            .iter()
            .zip(&self.b_ub)
            .all(|(lhs, rhs)| *lhs <= rhs + tolerance);
        let bounds = x
            .iter()
            .zip(&self.bounds)
            .all(|(x, (lb, ub))| *x >= lb - tolerance && *x <= ub + tolerance);

        eq && ub && bounds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// The solver failed for a reason unrelated to the model itself
    Failed,
}

/// What the solver made of an `LpModel`. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionResult {
    pub success: bool,
    pub status: SolveStatus,
    /// Optimal flows, indexed like the objective
    pub flows: Option<Vec<f64>>,
    pub total_cost: Option<f64>,
    pub message: String,
}

impl SolutionResult {
    fn failed(status: SolveStatus, message: String) -> SolutionResult {
        SolutionResult {
            success: false,
            status,
            flows: None,
            total_cost: None,
            message,
        }
    }
}

pub struct TransportationSolver {}

impl TransportationSolver {
    pub fn solve(model: &LpModel) -> SolutionResult {
        match catch_unwind(AssertUnwindSafe(|| TransportationSolver::solve_lp(model))) {
            Ok(result) => result,
            Err(_) => {
                warn!("Solver panicked");
                SolutionResult::failed(SolveStatus::Failed, "solver panicked".to_string())
            }
        }
    }

    fn solve_lp(model: &LpModel) -> SolutionResult {
        let mut problem = Problem::new(OptimizationDirection::Minimize);

        //*************CREATE VARIABLES*************//
        // quantity carried by ship v from supply port i to demand port j, in index order
        let x = model
            .dimensions
            .vars()
            .vars_with(|k| problem.add_var(model.objective[k], model.bounds[k]));

        // ******************** ADD CONSTRAINTS ********************
        let rows = model
            .a_eq
            .rows()
            .iter()
            .zip(&model.b_eq)
            .map(|row| (row, ComparisonOp::Eq))
            .chain(
                model
                    .a_ub
                    .rows()
                    .iter()
                    .zip(&model.b_ub)
                    .map(|row| (row, ComparisonOp::Le)),
            );

        for ((row, rhs), op) in rows {
            let lhs = row.iter().map(|&(col, coeff)| (x[col], coeff));
            problem.add_constraint(lhs, op, *rhs);
        }

        trace!(
            "Added {} variables and {} constraints to the solver",
            x.len(),
            model.a_eq.len() + model.a_ub.len()
        );

        match problem.solve() {
            Ok(solution) => {
                let flows = x.convert(&solution);
                let total_cost = solution.objective();
                info!("Found optimal allocation with total cost {}", total_cost);
                SolutionResult {
                    success: true,
                    status: SolveStatus::Optimal,
                    flows: Some(flows),
                    total_cost: Some(total_cost),
                    message: "optimization terminated successfully".to_string(),
                }
            }
            Err(err) => {
                let status = match err {
                    microlp::Error::Infeasible => SolveStatus::Infeasible,
                    microlp::Error::Unbounded => SolveStatus::Unbounded,
                    _ => SolveStatus::Failed,
                };
                warn!("Optimization failed: {}", err);
                SolutionResult::failed(status, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::RouteCosts;
    use crate::models::transportation_model::sets_and_parameters::balance;
    use ndarray::Array3;

    fn parameters(
        capacity: &[f64],
        fuel: &[f64],
        supply: &[f64],
        demand: &[f64],
        costs: Vec<f64>,
    ) -> Parameters {
        let shape = (capacity.len(), supply.len(), demand.len());
        let costs = RouteCosts::from_array(Array3::from_shape_vec(shape, costs).unwrap()).unwrap();
        let ports = balance(supply, demand).unwrap();
        Parameters::with_ports(ports, capacity.to_vec(), fuel.to_vec(), &costs).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn equality_rows_address_the_right_variables() {
        let params = parameters(&[10.0, 10.0], &[1.0, 1.0], &[3.0, 4.0], &[2.0, 5.0], vec![1.0; 8]);
        let model = LpModel::build(&params, CapacityMode::PerRoute).unwrap();
        let dims = model.dimensions;

        assert_eq!(model.objective.len(), 8);
        assert_eq!(model.a_eq.len(), 4);
        assert_eq!(model.b_eq, vec![3.0, 4.0, 2.0, 5.0]);

        let dense = model.a_eq.to_dense();
        for (v, i, j) in dims.triples() {
            let col = dims.index(v, i, j);
            for row in 0..2 {
                assert_eq!(dense[[row, col]], (row == i) as u8 as f64);
            }
            for row in 0..2 {
                assert_eq!(dense[[2 + row, col]], (row == j) as u8 as f64);
            }
        }
    }

    #[test]
    fn capacity_rows_follow_the_mode() {
        let params = parameters(&[10.0, 20.0], &[1.0, 1.0], &[3.0], &[3.0], vec![1.0, 2.0]);

        let per_route = LpModel::build(&params, CapacityMode::PerRoute).unwrap();
        assert_eq!(per_route.a_ub.len(), 2);
        assert_eq!(per_route.b_ub, vec![10.0, 20.0]);
        assert_eq!(per_route.a_ub.to_dense(), Array2::<f64>::eye(2));

        let params = parameters(&[10.0, 20.0], &[1.0, 1.0], &[3.0], &[1.0, 2.0], vec![1.0; 4]);
        let per_ship = LpModel::build(&params, CapacityMode::PerShipTotal).unwrap();
        assert_eq!(per_ship.a_ub.len(), 2);
        assert_eq!(per_ship.a_ub.rows()[1], vec![(2, 1.0), (3, 1.0)]);
        assert_eq!(per_ship.b_ub, vec![10.0, 20.0]);
        assert!(per_ship.bounds.iter().all(|&b| b == (0.0, f64::INFINITY)));
    }

    #[test]
    fn objective_flattens_the_cost_tensor() {
        let costs: Vec<f64> = (0..12).map(|c| c as f64).collect();
        let params = parameters(&[5.0, 5.0], &[2.0, 3.0], &[2.0, 2.0, 2.0], &[3.0, 3.0], costs);
        let model = LpModel::build(&params, CapacityMode::PerRoute).unwrap();

        let reshaped = Array3::from_shape_vec(model.dimensions.shape(), model.objective.clone())
            .unwrap();
        assert_eq!(reshaped, params.cost);
    }

    #[test]
    fn rejects_mismatched_tensor() {
        let mut params = parameters(&[5.0], &[1.0], &[2.0], &[2.0], vec![1.0]);
        params.cost = Array3::zeros((1, 2, 1));
        assert!(matches!(
            LpModel::build(&params, CapacityMode::PerRoute),
            Err(Error::DimensionMismatch { .. })
        ));

        let mut params = parameters(&[5.0], &[1.0], &[2.0], &[2.0], vec![1.0]);
        params.capacity.push(3.0);
        assert!(matches!(
            LpModel::build(&params, CapacityMode::PerRoute),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn single_route_pays_transport_plus_fuel_per_unit() {
        let params = parameters(&[100.0], &[5.0], &[50.0], &[50.0], vec![10.0]);
        let model = LpModel::build(&params, CapacityMode::PerRoute).unwrap();
        let result = TransportationSolver::solve(&model);

        assert!(result.success, "{}", result.message);
        assert_eq!(result.status, SolveStatus::Optimal);
        let flows = result.flows.unwrap();
        assert!(close(flows[0], 50.0));
        assert!(close(result.total_cost.unwrap(), 750.0));
    }

    #[test]
    fn capacity_below_demand_is_infeasible() {
        let params = parameters(&[30.0], &[0.0], &[50.0], &[50.0], vec![1.0]);
        let model = LpModel::build(&params, CapacityMode::PerRoute).unwrap();
        let result = TransportationSolver::solve(&model);

        assert!(!result.success);
        assert_eq!(result.status, SolveStatus::Infeasible);
        assert!(result.flows.is_none());
        assert!(result.total_cost.is_none());
        assert!(!result.message.is_empty());
    }

    #[test]
    fn optimal_flows_are_feasible() {
        let costs = vec![4.0, 6.0, 9.0, 5.0, 3.0, 8.0, 2.0, 7.0, 7.0, 1.0, 6.0, 4.0];
        let params = parameters(&[30.0, 15.0], &[2.0, 1.0], &[20.0, 30.0], &[10.0, 25.0, 5.0], costs);

        for mode in [CapacityMode::PerRoute, CapacityMode::PerShipTotal] {
            let model = LpModel::build(&params, mode).unwrap();
            let result = TransportationSolver::solve(&model);
            assert!(result.success, "{}", result.message);

            let flows = result.flows.unwrap();
            assert!(model.is_feasible(&flows, 1e-6));
            assert!(flows.iter().all(|&f| f >= -1e-9));
            assert!(close(model.objective_value(&flows), result.total_cost.unwrap()));
        }
    }

    #[test]
    fn per_ship_total_is_at_least_as_expensive() {
        // the cheap ship is small, so the total mode must move part of the cargo with the expensive one
        let costs = vec![1.0, 1.0, 1.0, 1.0, 9.0, 9.0, 9.0, 9.0];
        let params = parameters(&[10.0, 50.0], &[1.0, 1.0], &[10.0, 10.0], &[10.0, 10.0], costs);

        let route = TransportationSolver::solve(&LpModel::build(&params, CapacityMode::PerRoute).unwrap());
        let total =
            TransportationSolver::solve(&LpModel::build(&params, CapacityMode::PerShipTotal).unwrap());

        assert!(close(route.total_cost.unwrap(), 40.0));
        assert!(close(total.total_cost.unwrap(), 10.0 * 2.0 + 10.0 * 10.0));
    }

    #[test]
    fn capacity_mode_parses() {
        assert_eq!("per-route".parse::<CapacityMode>(), Ok(CapacityMode::PerRoute));
        assert_eq!(
            "per-ship-total".parse::<CapacityMode>(),
            Ok(CapacityMode::PerShipTotal)
        );
        assert!("both".parse::<CapacityMode>().is_err());
        assert_eq!(CapacityMode::default().to_string(), "per-route");
    }
}
