use derive_more::Display;

/// Every way an optimisation run can fail.
#[derive(Debug, Display)]
pub enum Error {
    /// Missing or non-positive fleet/port data
    #[display(fmt = "input error: {}", _0)]
    Input(String),
    /// A transport cost that is negative, not finite or was never supplied
    #[display(fmt = "invalid cost: {}", _0)]
    InvalidCost(String),
    /// Two pieces of the model disagree on their shape. This is a bug, not a user error
    #[display(
        fmt = "dimension mismatch in {}: expected {:?}, got {:?}",
        what,
        expected,
        actual
    )]
    DimensionMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// The solver could not find an optimum
    #[display(fmt = "optimization failed: {}", _0)]
    InfeasibleOrUnbounded(String),
    /// A run is already in flight
    #[display(fmt = "an optimization run is already in progress")]
    Busy,
    /// The run did not finish before its deadline
    #[display(fmt = "optimization did not finish within {:?}", _0)]
    Timeout(std::time::Duration),
    #[display(fmt = "optimization was cancelled")]
    Cancelled,
    /// The worker thread went away without reporting a result
    #[display(fmt = "optimization worker stopped without a result")]
    WorkerLost,
    #[display(fmt = "{}", _0)]
    Io(std::io::Error),
    #[display(fmt = "{}", _0)]
    Json(serde_json::Error),
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn dimension_mismatch(
        what: &'static str,
        expected: impl Into<Vec<usize>>,
        actual: impl Into<Vec<usize>>,
    ) -> Error {
        Error::DimensionMismatch {
            what,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
