//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a scenario (army composition) an episode was reset into.
///
/// Scenarios are indexed `0..scenario_count` for win-rate bookkeeping.
/// `ScenarioId(n)` corresponds to the n-th entry of the win-rate vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioId(pub u32);

impl ScenarioId {
    /// The scenario index as a `usize`, for indexing per-scenario vectors.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ScenarioId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identity handed to an environment factory when a worker starts.
///
/// Each worker derives its seed from the pool's base seed and its rank so
/// that parallel slots never replay the same random stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkerSeed {
    /// Worker rank, equal to the batch slot it serves.
    pub rank: usize,
    /// Environment seed: `base_seed + rank`.
    pub seed: u64,
}

impl WorkerSeed {
    /// Derive the seed for worker `rank` from a pool-wide base seed.
    pub fn derive(base_seed: u64, rank: usize) -> Self {
        Self {
            rank,
            seed: base_seed.wrapping_add(rank as u64),
        }
    }
}

impl fmt::Display for WorkerSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {} (seed {})", self.rank, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_index_matches_inner_value() {
        assert_eq!(ScenarioId::from(4).index(), 4);
        assert_eq!(ScenarioId(7).to_string(), "7");
    }

    #[test]
    fn worker_seed_offsets_by_rank() {
        let s = WorkerSeed::derive(100, 3);
        assert_eq!(s.rank, 3);
        assert_eq!(s.seed, 103);
    }

    #[test]
    fn worker_seed_wraps_instead_of_overflowing() {
        let s = WorkerSeed::derive(u64::MAX, 2);
        assert_eq!(s.seed, 1);
    }

    mod proptests {
        use crate::id::WorkerSeed;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn distinct_ranks_get_distinct_seeds(base in any::<u64>(), a in 0usize..256, b in 0usize..256) {
                prop_assume!(a != b);
                prop_assert_ne!(WorkerSeed::derive(base, a).seed, WorkerSeed::derive(base, b).seed);
                prop_assert_eq!(WorkerSeed::derive(base, a).seed.wrapping_sub(base), a as u64);
            }
        }
    }
}
