//! The [`Environment`] trait: the game wrapper each worker drives.

use crate::error::EnvError;
use crate::id::ScenarioId;
use crate::observation::{
    names, EntityMasks, EnvInfo, ObservationBundle, ObservationKind, ResetOptions, StatMap,
    StepOutcome,
};

/// A multi-agent environment owned by exactly one worker.
///
/// The environment is constructed inside its worker thread and never leaves
/// it, so implementations need not be `Send`. The worker calls the getters
/// right after `reset` and after every `step` to build the next
/// observation bundle; an environment is expected to auto-advance its
/// internal state before `step` returns.
///
/// Observation getters the environment does not support return `None`.
/// If the batch scheme requires a field that the environment never
/// provides, collection fails with a missing-field error.
pub trait Environment {
    /// Static metadata (episode limit, agent/action/entity counts).
    fn env_info(&self) -> EnvInfo;

    /// Start a new episode.
    fn reset(&mut self, options: &ResetOptions) -> Result<(), EnvError>;

    /// Apply one action per agent and advance the simulation.
    fn step(&mut self, actions: &[u32]) -> Result<StepOutcome, EnvError>;

    /// Available-action indicators for every agent.
    fn avail_actions(&self) -> Vec<f32>;

    /// Entity feature rows (entity scheme).
    fn entities(&self) -> Option<Vec<f32>> {
        None
    }

    /// Observability and presence masks (entity scheme).
    fn masks(&self) -> Option<EntityMasks> {
        None
    }

    /// Global state vector (flat scheme).
    fn state(&self) -> Option<Vec<f32>> {
        None
    }

    /// Per-agent observations (flat scheme).
    fn obs(&self) -> Option<Vec<f32>> {
        None
    }

    /// Scenario the current episode was reset into.
    fn scenario(&self) -> Option<ScenarioId> {
        None
    }

    /// Implementation-defined counters, e.g. number of forced restarts.
    fn stats(&self) -> StatMap {
        StatMap::new()
    }

    /// Release engine resources. Called once, before the worker exits.
    fn close(&mut self) {}

    /// Collect the pre-transition fields for `kind` into a bundle.
    ///
    /// Fields the environment does not provide are left out; the batch
    /// decides whether their absence is an error.
    fn observe(&self, kind: ObservationKind) -> ObservationBundle {
        let mut bundle = ObservationBundle::new();
        match kind {
            ObservationKind::Entity => {
                if let Some(entities) = self.entities() {
                    bundle.insert(names::ENTITIES, entities);
                }
                if let Some(masks) = self.masks() {
                    bundle.insert(names::OBS_MASK, masks.obs_mask);
                    bundle.insert(names::ENTITY_MASK, masks.entity_mask);
                    if let Some(gt) = masks.gt_mask {
                        bundle.insert(names::GT_MASK, gt);
                    }
                }
            }
            ObservationKind::Flat => {
                if let Some(state) = self.state() {
                    bundle.insert(names::STATE, state);
                }
                if let Some(obs) = self.obs() {
                    bundle.insert(names::OBS, obs);
                }
            }
        }
        bundle.insert(names::AVAIL_ACTIONS, self.avail_actions());
        bundle
    }
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn env_info(&self) -> EnvInfo {
        (**self).env_info()
    }
    fn reset(&mut self, options: &ResetOptions) -> Result<(), EnvError> {
        (**self).reset(options)
    }
    fn step(&mut self, actions: &[u32]) -> Result<StepOutcome, EnvError> {
        (**self).step(actions)
    }
    fn avail_actions(&self) -> Vec<f32> {
        (**self).avail_actions()
    }
    fn entities(&self) -> Option<Vec<f32>> {
        (**self).entities()
    }
    fn masks(&self) -> Option<EntityMasks> {
        (**self).masks()
    }
    fn state(&self) -> Option<Vec<f32>> {
        (**self).state()
    }
    fn obs(&self) -> Option<Vec<f32>> {
        (**self).obs()
    }
    fn scenario(&self) -> Option<ScenarioId> {
        (**self).scenario()
    }
    fn stats(&self) -> StatMap {
        (**self).stats()
    }
    fn close(&mut self) {
        (**self).close()
    }
}
