//! Observation bundles, step outcomes, and environment metadata.
//!
//! These are the payloads that cross the worker channel. Everything here is
//! plain owned data (`Send`), so a worker can hand a bundle to the runner
//! without sharing any environment state.

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Canonical field names used by the worker protocol and the batch scheme.
pub mod names {
    /// Per-entity feature rows, flattened `[n_entities * entity_dim]`.
    pub const ENTITIES: &str = "entities";
    /// Entity-to-entity observability mask, flattened `[n_entities * n_entities]`.
    pub const OBS_MASK: &str = "obs_mask";
    /// Entity presence mask, `[n_entities]`.
    pub const ENTITY_MASK: &str = "entity_mask";
    /// Optional ground-truth observability mask, same shape as `obs_mask`.
    pub const GT_MASK: &str = "gt_mask";
    /// Available-action indicators, flattened `[n_agents * n_actions]`.
    pub const AVAIL_ACTIONS: &str = "avail_actions";
    /// Global state vector (flat observation scheme).
    pub const STATE: &str = "state";
    /// Per-agent observations, flattened `[n_agents * obs_dim]`.
    pub const OBS: &str = "obs";
    /// Scalar reward for the transition.
    pub const REWARD: &str = "reward";
    /// Scalar true-termination flag for the transition.
    pub const TERMINATED: &str = "terminated";
    /// Chosen action per agent, `[n_agents]`.
    pub const ACTIONS: &str = "actions";
}

/// Well-known keys in [`StepInfo`].
pub mod info_keys {
    /// Non-zero when the episode ended because the horizon was reached.
    pub const EPISODE_LIMIT: &str = "episode_limit";
    /// `1` if the allied army won the battle, `0` otherwise.
    pub const BATTLE_WON: &str = "battle_won";
}

/// Per-agent actions for one environment step.
///
/// Inline for up to eight agents, which covers the common army sizes
/// without a heap allocation per step.
pub type AgentActions = SmallVec<[u32; 8]>;

/// Named numeric counters returned by `get_stats` (e.g. `restarts`).
pub type StatMap = IndexMap<String, f64>;

/// Which observation representation the environment produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ObservationKind {
    /// Variable-count entity list with attention masks.
    #[default]
    Entity,
    /// Fixed-size global state plus per-agent observation vectors.
    Flat,
}

/// Keyword options forwarded to `Environment::reset`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResetOptions {
    /// Draw the scenario from the held-out test set.
    pub test: bool,
    /// Force a specific scenario index instead of sampling one.
    pub index: Option<usize>,
}

/// Attention masks produced by an entity-scheme environment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityMasks {
    /// Agent-to-entity observability mask.
    pub obs_mask: Vec<f32>,
    /// Entity presence mask.
    pub entity_mask: Vec<f32>,
    /// Ground-truth observability mask, if the environment tracks one.
    pub gt_mask: Option<Vec<f32>>,
}

/// A named set of flattened observation fields for one slot and timestep.
///
/// Field order is insertion order, which keeps debug output stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservationBundle {
    fields: IndexMap<String, Vec<f32>>,
}

impl ObservationBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f32>) {
        self.fields.insert(name.into(), values);
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, values: Vec<f32>) -> Self {
        self.insert(name, values);
        self
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.fields.get(name).map(|v| v.as_slice())
    }

    /// Whether the bundle carries `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterate over `(name, values)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of fields in the bundle.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the bundle has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Extra information returned alongside a step.
///
/// A loosely-typed map because environments report arbitrary counters
/// (damage dealt, units lost, ...). The runner only interprets the keys in
/// [`info_keys`]; every key is summed into episode statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepInfo {
    values: IndexMap<String, f64>,
}

impl StepInfo {
    /// Create an empty info map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Whether this step was cut off by the episode horizon.
    ///
    /// Absent key means `false`.
    pub fn episode_limit_reached(&self) -> bool {
        self.get(info_keys::EPISODE_LIMIT)
            .is_some_and(|v| v != 0.0)
    }

    /// Battle outcome indicator, `0.0` when absent.
    pub fn battle_won(&self) -> f64 {
        self.get(info_keys::BATTLE_WON).unwrap_or(0.0)
    }

    /// Iterate over `(key, value)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Whether no keys are present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The immediate result of `Environment::step`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepOutcome {
    /// Team reward for the transition.
    pub reward: f32,
    /// Whether the episode is over (true end or horizon truncation).
    pub terminated: bool,
    /// Extra per-step information.
    pub info: StepInfo,
}

/// Static environment metadata, queried once before collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvInfo {
    /// Maximum number of steps in an episode.
    pub episode_limit: usize,
    /// Number of controllable agents.
    pub n_agents: usize,
    /// Number of discrete actions per agent.
    pub n_actions: usize,
    /// Maximum number of entities (allies + enemies) in any scenario.
    pub n_entities: usize,
    /// Feature width of one entity row.
    pub entity_dim: usize,
    /// Global state width (flat scheme).
    pub state_dim: usize,
    /// Per-agent observation width (flat scheme).
    pub obs_dim: usize,
    /// Whether the environment reports a ground-truth observability mask.
    pub has_gt_mask: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_info_keys_have_defaults() {
        let info = StepInfo::new();
        assert!(!info.episode_limit_reached());
        assert_eq!(info.battle_won(), 0.0);
    }

    #[test]
    fn bundle_preserves_insertion_order() {
        let b = ObservationBundle::new()
            .with(names::ENTITIES, vec![1.0, 2.0])
            .with(names::AVAIL_ACTIONS, vec![1.0]);
        let keys: Vec<_> = b.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![names::ENTITIES, names::AVAIL_ACTIONS]);
        assert_eq!(b.get(names::ENTITIES), Some(&[1.0, 2.0][..]));
        assert!(b.get(names::STATE).is_none());
    }
}
