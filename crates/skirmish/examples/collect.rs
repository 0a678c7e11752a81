//! Collect a few training and evaluation batches from random environments.
//!
//! Demonstrates:
//!   1. Configuring a runner with per-scenario win-rate tracking
//!   2. Spawning seeded workers from a factory closure
//!   3. Alternating training and evaluation collections
//!   4. Reading flushed reports and the worker statistics
//!
//! Run with:
//!   RUST_LOG=skirmish_runner=debug cargo run --example collect

use skirmish::prelude::*;
use skirmish_test_utils::{entity_info, RandomEnv, RandomPolicy};
use tracing_subscriber::EnvFilter;

// ─── Parameters ─────────────────────────────────────────────────

const WORKERS: usize = 4;
const EPISODE_LIMIT: usize = 30;
const SCENARIOS: u32 = 3;
const ROUNDS: usize = 5;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = RunnerConfig {
        batch_size_run: WORKERS,
        base_seed: 2024,
        test_nepisode: WORKERS,
        runner_log_interval: 200,
        scenario_count: SCENARIOS as usize,
        win_rate_rule: UpdateRule::BetaSmoothing { beta: 0.2 },
        ..RunnerConfig::default()
    };
    let mut runner = ParallelRunner::new(config, |seed| {
        Ok(RandomEnv::new(entity_info(EPISODE_LIMIT), seed, 0.1, SCENARIOS))
    })?;
    let mut policy = RandomPolicy::new(2, 3, 7);

    for round in 0..ROUNDS {
        let batch = runner.run(&mut policy, RunRequest::train())?;
        tracing::info!(
            round,
            t_env = runner.t_env(),
            max_len = batch.max_filled_len(),
            "training batch"
        );
        if let Some(report) = runner.take_report() {
            for (key, value) in report.entries() {
                println!("  {key:<24} {value:.3}");
            }
        }

        runner.run(&mut policy, RunRequest::test())?;
        if let Some(mean) = runner.last_test_return_mean() {
            println!("round {round}: test return {mean:.3}");
        }
    }

    println!("win rates: {:?}", runner.win_rates().estimates());
    println!("worker stats: {:?}", runner.last_env_stats());
    runner.close()?;
    Ok(())
}
