//! Error type for [`ParallelRunner`](crate::ParallelRunner).

use std::error::Error;
use std::fmt;
use std::time::Duration;

use skirmish_batch::BatchError;
use skirmish_core::{EnvError, PolicyError};
use skirmish_stats::StatsError;

use crate::config::ConfigError;
use crate::worker::WorkerError;

/// Errors from constructing a runner or collecting a batch.
///
/// Any error aborts the current collection; nothing is retried.
#[derive(Debug)]
pub enum RunnerError {
    /// The configuration failed validation.
    Config(ConfigError),
    /// Writing the batch failed (including malformed worker observations).
    Batch(BatchError),
    /// The win-rate tracker rejected an update or checkpoint.
    Stats(StatsError),
    /// The policy controller failed to select actions.
    Policy(PolicyError),
    /// An environment reported an error for a command.
    Environment {
        /// Slot whose environment failed.
        slot: usize,
        /// The environment's error.
        error: EnvError,
    },
    /// A worker thread exited or panicked.
    WorkerDisconnected {
        /// Slot served by the worker.
        slot: usize,
    },
    /// A worker did not reply within the configured timeout.
    WorkerTimeout {
        /// Slot served by the worker.
        slot: usize,
        /// How long the runner waited.
        waited: Duration,
    },
    /// Any other worker channel failure.
    Worker(WorkerError),
    /// The policy returned a different number of action vectors than
    /// there are active slots.
    ActionCountMismatch {
        /// Number of active slots.
        expected: usize,
        /// Number of action vectors returned.
        got: usize,
    },
    /// Slots were still running when the time axis ran out.
    HorizonExceeded {
        /// The environment's episode limit.
        episode_limit: usize,
        /// Number of slots still running.
        active: usize,
    },
    /// The runner has been closed.
    Closed,
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Batch(e) => write!(f, "batch error: {e}"),
            Self::Stats(e) => write!(f, "statistics error: {e}"),
            Self::Policy(e) => write!(f, "policy error: {e}"),
            Self::Environment { slot, error } => write!(f, "slot {slot}: {error}"),
            Self::WorkerDisconnected { slot } => {
                write!(f, "slot {slot}: worker disconnected")
            }
            Self::WorkerTimeout { slot, waited } => {
                write!(f, "slot {slot}: worker gave no reply after {waited:?}")
            }
            Self::Worker(e) => write!(f, "worker error: {e}"),
            Self::ActionCountMismatch { expected, got } => write!(
                f,
                "policy returned {got} action vectors for {expected} active slots"
            ),
            Self::HorizonExceeded {
                episode_limit,
                active,
            } => write!(
                f,
                "{active} slots still running after episode_limit={episode_limit} steps"
            ),
            Self::Closed => write!(f, "runner is closed"),
        }
    }
}

impl Error for RunnerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Batch(e) => Some(e),
            Self::Stats(e) => Some(e),
            Self::Policy(e) => Some(e),
            Self::Environment { error, .. } => Some(error),
            Self::Worker(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RunnerError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<BatchError> for RunnerError {
    fn from(e: BatchError) -> Self {
        Self::Batch(e)
    }
}

impl From<StatsError> for RunnerError {
    fn from(e: StatsError) -> Self {
        Self::Stats(e)
    }
}

impl From<PolicyError> for RunnerError {
    fn from(e: PolicyError) -> Self {
        Self::Policy(e)
    }
}

impl From<WorkerError> for RunnerError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::Disconnected { rank } => Self::WorkerDisconnected { slot: rank },
            WorkerError::Timeout { rank, waited } => Self::WorkerTimeout { slot: rank, waited },
            WorkerError::Startup { rank, error } => Self::Environment { slot: rank, error },
            other => Self::Worker(other),
        }
    }
}
