use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::Config;
use crate::costs::RouteCosts;
use crate::error::{Error, Result};
use crate::models::transportation_model::{
    Allocation, LpModel, Parameters, TransportationSolver,
};
use crate::problem::Problem;
use crate::termination::{CancellationToken, Termination};

/// How often a waiting caller checks its termination criterion
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the whole pipeline on the calling thread: balance, build the cost tensor and the model,
/// solve, and interpret the result.
pub fn optimize(problem: &Problem, costs: &RouteCosts, config: &Config) -> Result<Allocation> {
    config.validate()?;
    let parameters = Parameters::new(problem, costs)?;
    let model = LpModel::build(&parameters, config.capacity_mode)?;
    let result = TransportationSolver::solve(&model);

    if let Some(flows) = &result.flows {
        if !model.is_feasible(flows, 1e-6) {
            warn!("Solver returned flows that violate the model by more than 1e-6");
        }
    }

    Allocation::interpret(
        &result,
        parameters.dimensions,
        &parameters.ports,
        config.flow_tolerance,
    )
}

/// Releases the single run slot when dropped, including on panic.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn try_acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| BusyGuard(busy.clone()))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Executes optimization runs off the calling thread, one at a time.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    busy: Arc<AtomicBool>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if no run is in flight
    pub fn is_free(&self) -> bool {
        !self.busy.load(Ordering::Acquire)
    }

    /// Starts a run on a worker thread. The worker only sees the snapshots passed in.
    /// Fails with `Busy` while another run, including an abandoned one, is still solving.
    pub fn start(
        &self,
        problem: Arc<Problem>,
        costs: Arc<RouteCosts>,
        config: Config,
    ) -> Result<RunHandle> {
        let guard = BusyGuard::try_acquire(&self.busy).ok_or(Error::Busy)?;

        let token = CancellationToken::new();
        let termination = config.termination.clone().or_cancelled(token.clone());
        let (tx, rx) = channel();

        info!("Starting optimization run ({})", termination);
        thread::Builder::new()
            .name("optimizer".into())
            .spawn(move || {
                let result = optimize(&problem, &costs, &config);
                // free the slot before reporting, so the receiver can start a new run right away
                drop(guard);
                if tx.send(result).is_err() {
                    debug!("Optimization finished after the caller stopped waiting");
                }
            })?;

        Ok(RunHandle {
            rx,
            started: Instant::now(),
            termination,
            token,
        })
    }

    /// Starts a run and waits for it
    pub fn run(
        &self,
        problem: Arc<Problem>,
        costs: Arc<RouteCosts>,
        config: Config,
    ) -> Result<Allocation> {
        self.start(problem, costs, config)?.wait()
    }
}

/// A run in flight.
pub struct RunHandle {
    rx: Receiver<Result<Allocation>>,
    started: Instant,
    termination: Termination,
    token: CancellationToken,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Blocks until the run finishes or the termination criterion fires. The solver itself can not be
    /// interrupted, so an abandoned run keeps the runner busy until it finishes in the background.
    pub fn wait(self) -> Result<Allocation> {
        loop {
            if let Some(reason) = self.termination.reason(self.started.elapsed()) {
                warn!("Abandoning optimization run: {}", reason);
                return Err(reason);
            }

            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(result) => {
                    info!(
                        "Optimization run finished after {:?}",
                        self.started.elapsed()
                    );
                    return result;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(Error::WorkerLost),
            }
        }
    }
}
