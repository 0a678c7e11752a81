//! Integration test: failure paths abort a collection cleanly.
//!
//! Every error must surface with the slot that caused it, and the runner
//! must remain usable (or at least closable) afterwards.

use std::time::Duration;

use skirmish_batch::BatchError;
use skirmish_core::{names, EnvError};
use skirmish_stats::StatsError;
use skirmish_runner::{ConfigError, ParallelRunner, RunRequest, RunnerConfig, RunnerError};
use skirmish_test_utils::{entity_info, CallLog, FirstAvailablePolicy, Script, ScriptedEnv};

fn config(batch_size_run: usize) -> RunnerConfig {
    RunnerConfig {
        batch_size_run,
        ..RunnerConfig::default()
    }
}

fn uniform(n: usize, terminate_at: usize) -> Vec<Script> {
    (0..n)
        .map(|_| Script::new(entity_info(5), terminate_at))
        .collect()
}

// ── Construction ────────────────────────────────────────────────

#[test]
fn invalid_config_is_rejected_before_spawning() {
    let log = CallLog::new();
    let err = ParallelRunner::new(config(0), ScriptedEnv::factory(vec![], log.clone())).unwrap_err();
    assert!(matches!(err, RunnerError::Config(ConfigError::ZeroBatchSize)));
    assert!(log.calls().is_empty());
}

#[test]
fn factory_failure_names_the_slot() {
    let log = CallLog::new();
    // Only one script for two workers: worker 1 cannot build its env.
    let err =
        ParallelRunner::new(config(2), ScriptedEnv::factory(uniform(1, 2), log.clone()))
            .unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Environment {
            slot: 1,
            error: EnvError::Construction { .. }
        }
    ));
    // The worker that did start was closed.
    assert_eq!(log.closes(), 1);
}

// ── Collection ──────────────────────────────────────────────────

#[test]
fn missing_observation_field_is_a_batch_error() {
    let log = CallLog::new();
    let mut scripts = uniform(3, 2);
    scripts[1] = scripts[1].clone().omit(names::ENTITIES);
    let mut runner = ParallelRunner::new(config(3), ScriptedEnv::factory(scripts, log)).unwrap();

    let err = runner
        .run(&mut FirstAvailablePolicy::new(2, 3), RunRequest::train())
        .unwrap_err();
    match err {
        RunnerError::Batch(BatchError::MissingField { field, slot }) => {
            assert_eq!(field, names::ENTITIES);
            assert_eq!(slot, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.t_env(), 0);
}

#[test]
fn environment_error_names_the_slot() {
    let log = CallLog::new();
    let mut scripts = uniform(3, 4);
    scripts[2] = scripts[2].clone().fail_on_step(2);
    let mut runner = ParallelRunner::new(config(3), ScriptedEnv::factory(scripts, log)).unwrap();

    let err = runner
        .run(&mut FirstAvailablePolicy::new(2, 3), RunRequest::train())
        .unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Environment {
            slot: 2,
            error: EnvError::Simulation { .. }
        }
    ));
}

#[test]
fn runner_recovers_after_an_aborted_collection() {
    let log = CallLog::new();
    let mut scripts = uniform(3, 3);
    scripts[0] = scripts[0].clone().fail_on_step(1);
    let mut runner =
        ParallelRunner::new(config(3), ScriptedEnv::factory(scripts, log.clone())).unwrap();
    let mut policy = FirstAvailablePolicy::new(2, 3);

    // Slot 0 fails on its first step while slots 1 and 2 still owe a
    // reply; those are drained so the next run starts clean.
    assert!(runner.run(&mut policy, RunRequest::train()).is_err());

    // The failure was on the first step of the episode, so a retry after
    // reset fails again, at the same place, with no protocol error.
    let err = runner.run(&mut policy, RunRequest::train()).unwrap_err();
    assert!(matches!(err, RunnerError::Environment { slot: 0, .. }));
    assert_eq!(log.resets(), 6);
}

#[test]
fn out_of_range_scenario_aborts_before_accounting() {
    let log = CallLog::new();
    let mut scripts = uniform(2, 2);
    scripts[0] = scripts[0].clone().scenario(0).won();
    scripts[1] = scripts[1].clone().scenario(5);
    let cfg = RunnerConfig {
        scenario_count: 2,
        ..config(2)
    };
    let mut runner = ParallelRunner::new(cfg, ScriptedEnv::factory(scripts, log.clone())).unwrap();
    let mut policy = FirstAvailablePolicy::new(2, 3);

    let err = runner.run(&mut policy, RunRequest::train()).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Stats(StatsError::UnknownScenario {
            index: 5,
            scenario_count: 2
        })
    ));
    assert_eq!(runner.t_env(), 0);
    assert!(!runner.win_rates().has_pending());
    assert_eq!(runner.win_rates().estimates(), &[0.0, 0.0]);
    assert!(runner.take_report().is_none());
    assert_eq!(log.steps(), 0);

    // The reset replies were drained, so a retry fails the same way.
    let err = runner.run(&mut policy, RunRequest::train()).unwrap_err();
    assert!(matches!(err, RunnerError::Stats(_)));
    assert_eq!(runner.t_env(), 0);
}

#[test]
fn worker_panic_is_a_disconnect() {
    let log = CallLog::new();
    let mut scripts = uniform(2, 4);
    scripts[1] = scripts[1].clone().panic_on_step(2);
    let mut runner = ParallelRunner::new(config(2), ScriptedEnv::factory(scripts, log)).unwrap();

    let err = runner
        .run(&mut FirstAvailablePolicy::new(2, 3), RunRequest::train())
        .unwrap_err();
    assert!(matches!(err, RunnerError::WorkerDisconnected { slot: 1 }));
    // The remaining worker still shuts down; the dead one is reported.
    assert!(runner.close().is_err());
}

#[test]
fn slow_worker_times_out() {
    let log = CallLog::new();
    let mut scripts = uniform(2, 3);
    scripts[0] = scripts[0].clone().step_delay(Duration::from_secs(2));
    let cfg = RunnerConfig {
        response_timeout: Some(Duration::from_millis(200)),
        ..config(2)
    };
    let mut runner = ParallelRunner::new(cfg, ScriptedEnv::factory(scripts, log)).unwrap();

    let err = runner
        .run(&mut FirstAvailablePolicy::new(2, 3), RunRequest::train())
        .unwrap_err();
    match err {
        RunnerError::WorkerTimeout { slot, waited } => {
            assert_eq!(slot, 0);
            assert_eq!(waited, Duration::from_millis(200));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn wrong_action_count_is_rejected() {
    let log = CallLog::new();
    let mut runner =
        ParallelRunner::new(config(2), ScriptedEnv::factory(uniform(2, 2), log.clone())).unwrap();
    let mut policy = FirstAvailablePolicy::new(2, 3);
    policy.extra_actions = 1;

    let err = runner.run(&mut policy, RunRequest::train()).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::ActionCountMismatch {
            expected: 2,
            got: 3
        }
    ));
    assert_eq!(log.steps(), 0);
}

#[test]
fn episodes_past_the_limit_exceed_the_horizon() {
    let log = CallLog::new();
    // Horizon 5 but the scripts never end before step 7.
    let mut runner =
        ParallelRunner::new(config(2), ScriptedEnv::factory(uniform(2, 7), log)).unwrap();

    let err = runner
        .run(&mut FirstAvailablePolicy::new(2, 3), RunRequest::train())
        .unwrap_err();
    assert!(matches!(
        err,
        RunnerError::HorizonExceeded {
            episode_limit: 5,
            active: 2
        }
    ));
    assert_eq!(runner.t_env(), 0);
}

// ── Shutdown ────────────────────────────────────────────────────

#[test]
fn close_is_idempotent() {
    let log = CallLog::new();
    let mut runner =
        ParallelRunner::new(config(4), ScriptedEnv::factory(uniform(4, 2), log.clone())).unwrap();
    runner
        .run(&mut FirstAvailablePolicy::new(2, 3), RunRequest::train())
        .unwrap();

    runner.close().unwrap();
    runner.close().unwrap();
    assert_eq!(log.closes(), 4);

    let err = runner
        .run(&mut FirstAvailablePolicy::new(2, 3), RunRequest::train())
        .unwrap_err();
    assert!(matches!(err, RunnerError::Closed));

    drop(runner);
    assert_eq!(log.closes(), 4);
}

#[test]
fn drop_closes_workers() {
    let log = CallLog::new();
    let runner =
        ParallelRunner::new(config(3), ScriptedEnv::factory(uniform(3, 2), log.clone())).unwrap();
    drop(runner);
    assert_eq!(log.closes(), 3);
}
