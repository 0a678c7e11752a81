//! Criterion micro-benchmarks for episode batch allocation and writes.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use skirmish_batch::{EpisodeBatch, Scheme};
use skirmish_core::{names, EnvInfo, ObservationBundle, ObservationKind};

/// A 3s5z-sized entity scheme: 8 agents, 16 entities.
fn env_info() -> EnvInfo {
    EnvInfo {
        episode_limit: 150,
        n_agents: 8,
        n_actions: 14,
        n_entities: 16,
        entity_dim: 32,
        state_dim: 0,
        obs_dim: 0,
        has_gt_mask: false,
    }
}

fn scheme() -> Arc<Scheme> {
    Arc::new(Scheme::from_env_info(&env_info(), ObservationKind::Entity).unwrap())
}

fn bundle(info: &EnvInfo) -> ObservationBundle {
    ObservationBundle::new()
        .with(names::ENTITIES, vec![0.5; info.n_entities * info.entity_dim])
        .with(names::OBS_MASK, vec![0.0; info.n_entities * info.n_entities])
        .with(names::ENTITY_MASK, vec![0.0; info.n_entities])
        .with(names::AVAIL_ACTIONS, vec![1.0; info.n_agents * info.n_actions])
}

/// Benchmark: allocate an 8-slot batch for a 150-step horizon.
fn bench_batch_alloc(c: &mut Criterion) {
    let scheme = scheme();
    c.bench_function("batch_alloc_8x151", |b| {
        b.iter(|| {
            let batch = EpisodeBatch::new(Arc::clone(&scheme), 8, 151).unwrap();
            black_box(batch.memory_bytes());
        });
    });
}

/// Benchmark: one full round of observation writes across 8 slots.
fn bench_write_observation_round(c: &mut Criterion) {
    let info = env_info();
    let bundle = bundle(&info);
    let mut batch = EpisodeBatch::new(scheme(), 8, 151).unwrap();
    let mut t = 0usize;
    c.bench_function("write_observation_round_8", |b| {
        b.iter(|| {
            for slot in 0..8 {
                batch.write_observation(&bundle, slot, t).unwrap();
            }
            t = (t + 1) % 151;
        });
    });
}

/// Benchmark: scan the filled mask of a fully collected batch.
fn bench_max_filled_len(c: &mut Criterion) {
    let info = env_info();
    let bundle = bundle(&info);
    let mut batch = EpisodeBatch::new(scheme(), 8, 151).unwrap();
    for slot in 0..8 {
        for t in 0..=(slot * 18) {
            batch.write_observation(&bundle, slot, t).unwrap();
        }
    }
    c.bench_function("max_filled_len_8x151", |b| {
        b.iter(|| black_box(batch.max_filled_len()));
    });
}

criterion_group!(
    benches,
    bench_batch_alloc,
    bench_write_observation_round,
    bench_max_filled_len
);
criterion_main!(benches);
