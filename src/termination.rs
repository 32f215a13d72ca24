use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

/// A flag shared between the caller and a running optimization. Once set it stays set.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug)]
pub enum Termination {
    /// Maximum running time, counted from the start of the run
    Timeout(Duration),
    /// Terminate once the token is cancelled
    Cancelled(CancellationToken),
    /// Wait for the solver, however long it takes
    Never,
    /// Terminate if either of the two termination criteria
    /// tells it to terminate
    Any(Box<Termination>, Box<Termination>),
    /// Terminate when both of the criteria tells it to terminate
    All(Box<Termination>, Box<Termination>),
}

impl Default for Termination {
    fn default() -> Self {
        Termination::Never
    }
}

impl Termination {
    pub fn should_terminate(&self, elapsed: Duration) -> bool {
        self.reason(elapsed).is_some()
    }

    /// The error to report if the run should be abandoned after `elapsed`
    pub fn reason(&self, elapsed: Duration) -> Option<Error> {
        match self {
            Termination::Timeout(duration) => (elapsed > *duration).then(|| Error::Timeout(*duration)),
            Termination::Cancelled(token) => token.is_cancelled().then(|| Error::Cancelled),
            Termination::Never => None,
            Termination::Any(one, two) => one.reason(elapsed).or_else(|| two.reason(elapsed)),
            Termination::All(one, two) => match (one.reason(elapsed), two.reason(elapsed)) {
                (Some(reason), Some(_)) => Some(reason),
                _ => None,
            },
        }
    }

    /// Combines `self` with a cancellation token, terminating on whichever fires first
    pub fn or_cancelled(self, token: CancellationToken) -> Termination {
        match self {
            Termination::Never => Termination::Cancelled(token),
            other => Termination::Any(Box::new(other), Box::new(Termination::Cancelled(token))),
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Timeout(dur) => write!(f, "{} timeout", dur.as_secs()),
            Termination::Cancelled(_) => write!(f, "cancelled"),
            Termination::Never => write!(f, "never"),
            Termination::Any(lhs, rhs) => write!(f, "({lhs}) | ({rhs})"),
            Termination::All(lhs, rhs) => write!(f, "({lhs}) & ({rhs})"),
        }
    }
}
