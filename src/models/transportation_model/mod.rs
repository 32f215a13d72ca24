pub mod allocation;
pub mod model;
pub mod sets_and_parameters;

pub use allocation::{Allocation, Route};
pub use model::{CapacityMode, LpModel, SolutionResult, SolveStatus, TransportationSolver};
pub use sets_and_parameters::{balance, BalancedPorts, Dimensions, Parameters, Synthetic};
