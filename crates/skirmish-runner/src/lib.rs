//! Parallel experience collection for Skirmish.
//!
//! A [`ParallelRunner`] owns one worker thread per batch slot. Each worker
//! builds its own [`Environment`](skirmish_core::Environment) from a shared
//! factory and serves a strict request/response protocol over a pair of
//! bounded channels. The runner drives all workers in lockstep, asks a
//! [`PolicyController`] for actions, and fills an
//! [`EpisodeBatch`](skirmish_batch::EpisodeBatch) until every slot's
//! episode has ended.
//!
//! # Threading model
//!
//! ```text
//!                       ┌──────────────────────┐
//!   policy ◄──────────► │    ParallelRunner    │  (caller's thread)
//!                       └──┬───────┬───────┬───┘
//!              bounded(1)  │       │       │   one request in flight
//!                       ┌──▼──┐ ┌──▼──┐ ┌──▼──┐
//!                       │ w0  │ │ w1  │ │ wN  │  skirmish-worker-{rank}
//!                       │ env │ │ env │ │ env │
//!                       └─────┘ └─────┘ └─────┘
//! ```
//!
//! The runner blocks at the reset barrier, at every step receive, and at
//! the statistics barrier. Workers step their environments concurrently.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod policy;
pub mod report;
pub mod runner;
pub mod worker;

pub use config::{ConfigError, RunnerConfig};
pub use error::RunnerError;
pub use policy::PolicyController;
pub use report::RunReport;
pub use runner::{ParallelRunner, RunRequest};
pub use worker::{WorkerError, WorkerHandle};
