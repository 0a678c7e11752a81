//! Worker command and response types.
//!
//! The runner and each worker speak a strict request/response protocol
//! over a duplex channel: one [`WorkerCommand`] in, exactly one
//! [`WorkerResponse`] out, never pipelined. The worker dispatches every
//! command through a single `match`, so adding a variant forces every
//! handler to be updated.

use crate::error::EnvError;
use crate::id::ScenarioId;
use crate::observation::{AgentActions, EnvInfo, ObservationBundle, ResetOptions, StatMap, StepInfo};

/// A request sent from the runner to one worker.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerCommand {
    /// Start a new episode and return the initial observation.
    Reset(ResetOptions),
    /// Apply one action per agent and return the transition plus the
    /// next observation.
    Step(AgentActions),
    /// Return the environment's implementation-defined counters.
    GetStats,
    /// Return static environment metadata.
    GetEnvInfo,
    /// Release resources; the worker replies [`WorkerResponse::Closed`]
    /// and exits its loop.
    Close,
}

impl WorkerCommand {
    /// Short protocol name, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reset(_) => "reset",
            Self::Step(_) => "step",
            Self::GetStats => "get_stats",
            Self::GetEnvInfo => "get_env_info",
            Self::Close => "close",
        }
    }
}

/// Initial observation of a freshly reset episode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetReply {
    /// Pre-transition fields for timestep 0.
    pub observation: ObservationBundle,
    /// Scenario the episode was reset into, if the environment reports one.
    pub scenario: Option<ScenarioId>,
}

/// Transition data for one step, bundled with the next observation.
///
/// The next observation travels in the same reply so the runner can
/// select the following action without a second round trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReply {
    /// Team reward for the transition.
    pub reward: f32,
    /// Episode over, either truly or by horizon truncation.
    pub terminated: bool,
    /// Extra per-step information (`episode_limit`, `battle_won`, ...).
    pub info: StepInfo,
    /// Pre-transition fields for the next timestep.
    pub observation: ObservationBundle,
}

impl StepReply {
    /// Whether the episode reached a true terminal state.
    ///
    /// `terminated AND NOT info.episode_limit`: horizon truncation is not a
    /// terminal state for bootstrapping purposes.
    pub fn env_terminated(&self) -> bool {
        self.terminated && !self.info.episode_limit_reached()
    }
}

/// A reply sent from a worker back to the runner.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerResponse {
    /// The worker built its environment and is waiting for commands.
    Ready,
    /// Reply to [`WorkerCommand::Reset`].
    Reset(ResetReply),
    /// Reply to [`WorkerCommand::Step`].
    Step(StepReply),
    /// Reply to [`WorkerCommand::GetStats`].
    Stats(StatMap),
    /// Reply to [`WorkerCommand::GetEnvInfo`].
    EnvInfo(EnvInfo),
    /// Reply to [`WorkerCommand::Close`]; the worker has exited.
    Closed,
    /// The environment failed while executing the command.
    Failed(EnvError),
}

impl WorkerResponse {
    /// Short protocol name, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Reset(_) => "reset",
            Self::Step(_) => "step",
            Self::Stats(_) => "stats",
            Self::EnvInfo(_) => "env_info",
            Self::Closed => "closed",
            Self::Failed(_) => "failed",
        }
    }
}
