//! Standard environment metadata for tests.

use skirmish_core::EnvInfo;

/// Entity-scheme metadata: 2 agents, 3 actions, 4 entities of width 3.
pub fn entity_info(episode_limit: usize) -> EnvInfo {
    EnvInfo {
        episode_limit,
        n_agents: 2,
        n_actions: 3,
        n_entities: 4,
        entity_dim: 3,
        state_dim: 0,
        obs_dim: 0,
        has_gt_mask: false,
    }
}

/// Flat-scheme metadata: 2 agents, 3 actions, state width 6, obs width 4.
pub fn flat_info(episode_limit: usize) -> EnvInfo {
    EnvInfo {
        episode_limit,
        n_agents: 2,
        n_actions: 3,
        n_entities: 0,
        entity_dim: 0,
        state_dim: 6,
        obs_dim: 4,
        has_gt_mask: false,
    }
}
