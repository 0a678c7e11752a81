//! Skirmish: parallel multi-agent experience collection.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Skirmish sub-crates. Most users only need `skirmish` as a single
//! dependency.
//!
//! # Quick start
//!
//! ```rust
//! use skirmish::prelude::*;
//!
//! // One agent walks a three-step corridor.
//! struct Corridor {
//!     t: usize,
//! }
//!
//! impl Environment for Corridor {
//!     fn env_info(&self) -> EnvInfo {
//!         EnvInfo {
//!             episode_limit: 4,
//!             n_agents: 1,
//!             n_actions: 2,
//!             n_entities: 0,
//!             entity_dim: 0,
//!             state_dim: 1,
//!             obs_dim: 1,
//!             has_gt_mask: false,
//!         }
//!     }
//!     fn reset(&mut self, _options: &ResetOptions) -> Result<(), EnvError> {
//!         self.t = 0;
//!         Ok(())
//!     }
//!     fn step(&mut self, _actions: &[u32]) -> Result<StepOutcome, EnvError> {
//!         self.t += 1;
//!         Ok(StepOutcome {
//!             reward: 1.0,
//!             terminated: self.t >= 3,
//!             info: StepInfo::new(),
//!         })
//!     }
//!     fn avail_actions(&self) -> Vec<f32> {
//!         vec![1.0, 1.0]
//!     }
//!     fn state(&self) -> Option<Vec<f32>> {
//!         Some(vec![self.t as f32])
//!     }
//!     fn obs(&self) -> Option<Vec<f32>> {
//!         Some(vec![self.t as f32])
//!     }
//! }
//!
//! // Always chooses action 0.
//! struct Idle;
//!
//! impl PolicyController for Idle {
//!     fn init_hidden(&mut self, _batch_size: usize) {}
//!     fn select_actions(
//!         &mut self,
//!         _batch: &EpisodeBatch,
//!         _t_ep: usize,
//!         _t_env: u64,
//!         active: &[usize],
//!         _test_mode: bool,
//!     ) -> Result<Vec<AgentActions>, PolicyError> {
//!         Ok(active.iter().map(|_| AgentActions::from_slice(&[0])).collect())
//!     }
//! }
//!
//! let config = RunnerConfig {
//!     batch_size_run: 2,
//!     observation: ObservationKind::Flat,
//!     ..RunnerConfig::default()
//! };
//! let mut runner = ParallelRunner::new(config, |_seed| Ok(Corridor { t: 0 }))?;
//! let batch = runner.run(&mut Idle, RunRequest::train())?;
//! assert_eq!(batch.episode_length(0), 3);
//! assert_eq!(batch.max_filled_len(), 4);
//! assert_eq!(runner.t_env(), 6);
//! runner.close()?;
//! # Ok::<(), RunnerError>(())
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `skirmish-core` | IDs, observation bundles, worker protocol, `Environment` |
//! | [`batch`] | `skirmish-batch` | Field scheme and the masked `EpisodeBatch` buffer |
//! | [`stats`] | `skirmish-stats` | Episode statistics and per-scenario win rates |
//! | [`runner`] | `skirmish-runner` | Worker threads, `ParallelRunner`, policy interface |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`skirmish-core`).
///
/// Contains the [`types::Environment`] trait, observation bundles, the
/// worker command/response enums, and the environment and policy error
/// types.
pub use skirmish_core as types;

/// Field scheme and episode buffer (`skirmish-batch`).
///
/// [`batch::EpisodeBatch`] stores every field as a dense
/// `[batch, time, len]` array with a per-timestep filled mask.
pub use skirmish_batch as batch;

/// Episode statistics and win-rate tracking (`skirmish-stats`).
pub use skirmish_stats as stats;

/// Parallel collection (`skirmish-runner`).
///
/// [`runner::ParallelRunner`] drives one worker thread per batch slot and
/// hands each call a filled [`batch::EpisodeBatch`].
pub use skirmish_runner as runner;

/// Common imports for typical Skirmish usage.
///
/// ```rust
/// use skirmish::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use skirmish_core::{
        info_keys, names, AgentActions, EntityMasks, EnvInfo, Environment, ObservationKind,
        ResetOptions, ScenarioId, StatMap, StepInfo, StepOutcome, WorkerSeed,
    };

    // Errors
    pub use skirmish_batch::BatchError;
    pub use skirmish_core::{EnvError, PolicyError};
    pub use skirmish_runner::RunnerError;
    pub use skirmish_stats::StatsError;

    // Batch
    pub use skirmish_batch::{EpisodeBatch, Scheme};

    // Statistics
    pub use skirmish_stats::{UpdateRule, WinRateSchedule, WinRateTracker};

    // Runner
    pub use skirmish_runner::{
        ParallelRunner, PolicyController, RunReport, RunRequest, RunnerConfig,
    };
}
