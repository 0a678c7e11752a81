//! Core types and traits for the Skirmish experience-collection framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! vocabulary shared by the batch buffer, the statistics trackers, and the
//! parallel runner: scenario IDs, observation bundles, the worker
//! command/response protocol, the [`Environment`] trait, and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod command;
pub mod env;
pub mod error;
pub mod id;
pub mod observation;

pub use command::{ResetReply, StepReply, WorkerCommand, WorkerResponse};
pub use env::Environment;
pub use error::{EnvError, PolicyError};
pub use id::{ScenarioId, WorkerSeed};
pub use observation::{
    info_keys, names, AgentActions, EntityMasks, EnvInfo, ObservationBundle, ObservationKind,
    ResetOptions, StatMap, StepInfo, StepOutcome,
};
