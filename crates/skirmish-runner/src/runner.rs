//! [`ParallelRunner`]: lockstep collection of one batch of episodes.
//!
//! # Collection round
//!
//! 1. Reset every worker (barrier) and write the initial observations at
//!    `t = 0`.
//! 2. Ask the policy for actions for the active slots and record them at
//!    `t`. Send `Step` only to slots whose episode is still running.
//! 3. Receive replies in slot order, record reward and true termination at
//!    `t`, then write the next observations at `t + 1`.
//! 4. Repeat until no slot is running, then query `get_stats` from every
//!    worker (barrier) and update episode statistics and win rates.
//!
//! A slot that terminated during round `t` still appears in the active
//! set of round `t + 1` so its final observation row carries an action,
//! but it is never stepped again.

use std::sync::Arc;
use std::time::Duration;

use skirmish_batch::{EpisodeBatch, Scheme};
use skirmish_core::{
    names, EnvError, EnvInfo, Environment, ObservationBundle, ResetOptions, ScenarioId, StatMap,
    StepInfo, StepReply, WorkerCommand, WorkerResponse, WorkerSeed,
};
use skirmish_stats::{EpisodeStats, StatsError, WinRateSchedule, WinRateTracker};

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::policy::PolicyController;
use crate::report::RunReport;
use crate::worker::{WorkerError, WorkerHandle};

// ── RunRequest ──────────────────────────────────────────────────

/// Options for one call to [`ParallelRunner::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Greedy action selection, no `t_env` accounting, evaluation stats.
    pub test_mode: bool,
    /// Reset into held-out test scenarios. Defaults to `test_mode`.
    pub test_scenario: Option<bool>,
    /// Force every worker into this scenario index.
    pub scenario_index: Option<usize>,
}

impl RunRequest {
    /// A training collection.
    pub fn train() -> Self {
        Self::default()
    }

    /// An evaluation collection on test scenarios.
    pub fn test() -> Self {
        Self {
            test_mode: true,
            ..Self::default()
        }
    }

    /// Override which scenario set workers reset into.
    pub fn with_test_scenario(mut self, test_scenario: bool) -> Self {
        self.test_scenario = Some(test_scenario);
        self
    }

    /// Force a scenario index.
    pub fn with_scenario_index(mut self, index: usize) -> Self {
        self.scenario_index = Some(index);
        self
    }

    fn reset_options(&self) -> ResetOptions {
        ResetOptions {
            test: self.test_scenario.unwrap_or(self.test_mode),
            index: self.scenario_index,
        }
    }
}

// ── Per-run bookkeeping ─────────────────────────────────────────

/// Per-slot accumulators for one collection.
struct SlotTally {
    returns: Vec<f64>,
    lengths: Vec<usize>,
    won: Vec<bool>,
    scenarios: Vec<Option<ScenarioId>>,
    final_infos: Vec<StepInfo>,
    env_steps: u64,
}

impl SlotTally {
    fn new(batch_size: usize) -> Self {
        Self {
            returns: vec![0.0; batch_size],
            lengths: vec![0; batch_size],
            won: vec![false; batch_size],
            scenarios: Vec::with_capacity(batch_size),
            final_infos: Vec::with_capacity(batch_size),
            env_steps: 0,
        }
    }
}

// ── ParallelRunner ──────────────────────────────────────────────

/// Drives `batch_size_run` environment workers in lockstep.
///
/// Created with [`new`](Self::new), which spawns the workers, waits for
/// every environment to be built, and queries environment metadata from
/// worker 0. Each [`run`](Self::run) returns one filled [`EpisodeBatch`].
/// Statistics and win-rate estimates persist across runs.
///
/// Dropping the runner closes all workers.
pub struct ParallelRunner {
    config: RunnerConfig,
    workers: Vec<WorkerHandle>,
    env_info: EnvInfo,
    scheme: Arc<Scheme>,
    t_env: u64,
    train_stats: EpisodeStats,
    test_stats: EpisodeStats,
    last_train_flush: Option<u64>,
    last_test_return_mean: Option<f64>,
    last_env_stats: StatMap,
    win_rates: WinRateTracker,
    report: Option<RunReport>,
    closed: bool,
}

impl ParallelRunner {
    /// Spawn the worker pool and build the batch scheme.
    ///
    /// Worker `r` calls `factory(WorkerSeed { rank: r, seed: base_seed + r })`
    /// inside its own thread.
    ///
    /// # Errors
    ///
    /// Configuration errors, any worker's factory error (as
    /// [`RunnerError::Environment`]), or a scheme that cannot be built from
    /// the reported [`EnvInfo`]. All started workers are closed first.
    pub fn new<E, F>(config: RunnerConfig, factory: F) -> Result<Self, RunnerError>
    where
        E: Environment + 'static,
        F: Fn(WorkerSeed) -> Result<E, EnvError> + Send + Sync + 'static,
    {
        config.validate()?;
        let win_rates = match &config.initial_win_rates {
            Some(initial) => WinRateTracker::from_estimates(initial.clone(), config.win_rate_rule)?,
            None => WinRateTracker::new(config.scenario_count, config.win_rate_rule)?,
        };

        let factory = Arc::new(factory);
        let mut workers = Vec::with_capacity(config.batch_size_run);
        for rank in 0..config.batch_size_run {
            let seed = WorkerSeed::derive(config.base_seed, rank);
            match WorkerHandle::spawn(seed, config.observation, Arc::clone(&factory)) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    close_all(&mut workers, config.response_timeout);
                    return Err(e.into());
                }
            }
        }

        let (env_info, scheme) = match handshake(&mut workers, &config) {
            Ok(ready) => ready,
            Err(e) => {
                close_all(&mut workers, config.response_timeout);
                return Err(e);
            }
        };

        tracing::info!(
            workers = workers.len(),
            episode_limit = env_info.episode_limit,
            n_agents = env_info.n_agents,
            fields = scheme.len(),
            "worker pool started"
        );

        Ok(Self {
            config,
            workers,
            env_info,
            scheme: Arc::new(scheme),
            t_env: 0,
            train_stats: EpisodeStats::new(),
            test_stats: EpisodeStats::new(),
            last_train_flush: None,
            last_test_return_mean: None,
            last_env_stats: StatMap::new(),
            win_rates,
            report: None,
            closed: false,
        })
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Environment metadata reported by worker 0.
    pub fn env_info(&self) -> &EnvInfo {
        &self.env_info
    }

    /// Maximum episode length.
    pub fn episode_limit(&self) -> usize {
        self.env_info.episode_limit
    }

    /// Number of parallel slots.
    pub fn batch_size(&self) -> usize {
        self.workers.len()
    }

    /// Field registry every batch is built from.
    pub fn scheme(&self) -> &Arc<Scheme> {
        &self.scheme
    }

    /// Training environment steps collected so far.
    pub fn t_env(&self) -> u64 {
        self.t_env
    }

    /// Mean return of the most recent completed evaluation round.
    pub fn last_test_return_mean(&self) -> Option<f64> {
        self.last_test_return_mean
    }

    /// Per-key sum of the worker statistics from the last batch.
    pub fn last_env_stats(&self) -> &StatMap {
        &self.last_env_stats
    }

    /// The per-scenario win-rate tracker.
    pub fn win_rates(&self) -> &WinRateTracker {
        &self.win_rates
    }

    /// Take the report produced by the most recent flush, if any.
    pub fn take_report(&mut self) -> Option<RunReport> {
        self.report.take()
    }

    /// The runner's configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    // ── Collection ──────────────────────────────────────────────

    /// Collect one batch of `batch_size` complete episodes.
    ///
    /// # Errors
    ///
    /// Any worker, environment, policy, or batch failure aborts the
    /// collection. Replies still in flight are drained before returning so
    /// the next call starts from a clean protocol state.
    pub fn run<P>(
        &mut self,
        policy: &mut P,
        request: RunRequest,
    ) -> Result<EpisodeBatch, RunnerError>
    where
        P: PolicyController + ?Sized,
    {
        if self.closed {
            return Err(RunnerError::Closed);
        }
        let result = self.collect(policy, request);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "collection aborted");
            self.drain_pending();
        }
        result
    }

    fn collect<P>(
        &mut self,
        policy: &mut P,
        request: RunRequest,
    ) -> Result<EpisodeBatch, RunnerError>
    where
        P: PolicyController + ?Sized,
    {
        let batch_size = self.workers.len();
        let timeout = self.config.response_timeout;
        let test_mode = request.test_mode;
        let mut batch = EpisodeBatch::new(
            Arc::clone(&self.scheme),
            batch_size,
            self.env_info.episode_limit + 1,
        )?;
        let mut tally = SlotTally::new(batch_size);

        // Reset barrier.
        let options = request.reset_options();
        for worker in &mut self.workers {
            worker.send(WorkerCommand::Reset(options.clone()))?;
        }
        for (slot, worker) in self.workers.iter_mut().enumerate() {
            let reply = match worker.recv(timeout)? {
                WorkerResponse::Reset(reply) => reply,
                other => return Err(unexpected(slot, "reset", other)),
            };
            if let Some(scenario) = reply.scenario {
                let scenario_count = self.win_rates.scenario_count();
                if scenario_count > 0 && scenario.index() >= scenario_count {
                    return Err(StatsError::UnknownScenario {
                        index: scenario.index(),
                        scenario_count,
                    }
                    .into());
                }
            }
            batch.write_observation(&reply.observation, slot, 0)?;
            tally.scenarios.push(reply.scenario);
        }

        policy.init_hidden(batch_size);
        policy.eval();

        let mut terminated = vec![false; batch_size];
        let mut active: Vec<usize> = (0..batch_size).collect();
        let mut t = 0usize;
        loop {
            let actions = policy.select_actions(&batch, t, self.t_env, &active, test_mode)?;
            if actions.len() != active.len() {
                return Err(RunnerError::ActionCountMismatch {
                    expected: active.len(),
                    got: actions.len(),
                });
            }
            for (&slot, agent_actions) in active.iter().zip(actions) {
                let values: Vec<f32> = agent_actions.iter().map(|&a| a as f32).collect();
                batch.write(names::ACTIONS, slot, t, &values)?;
                if !terminated[slot] {
                    self.workers[slot].send(WorkerCommand::Step(agent_actions))?;
                }
            }

            active = (0..batch_size).filter(|&slot| !terminated[slot]).collect();
            if active.is_empty() {
                break;
            }

            let mut next: Vec<(usize, ObservationBundle)> = Vec::with_capacity(active.len());
            for &slot in &active {
                let reply = match self.workers[slot].recv(timeout)? {
                    WorkerResponse::Step(reply) => reply,
                    other => return Err(unexpected(slot, "step", other)),
                };
                let env_terminated = reply.env_terminated();
                let StepReply {
                    reward,
                    terminated: done,
                    info,
                    observation,
                } = reply;

                tally.returns[slot] += f64::from(reward);
                tally.lengths[slot] += 1;
                if !test_mode {
                    tally.env_steps += 1;
                }
                if done {
                    tally.won[slot] = info.battle_won() != 0.0;
                    tally.final_infos.push(info);
                }
                terminated[slot] = done;

                batch.write_scalar(names::REWARD, slot, t, reward)?;
                batch.write_scalar(
                    names::TERMINATED,
                    slot,
                    t,
                    if env_terminated { 1.0 } else { 0.0 },
                )?;
                next.push((slot, observation));
            }

            t += 1;
            if t >= batch.max_seq_length() {
                return Err(RunnerError::HorizonExceeded {
                    episode_limit: self.env_info.episode_limit,
                    active: next.len(),
                });
            }
            for (slot, observation) in &next {
                batch.write_observation(observation, *slot, t)?;
            }
        }

        // Statistics barrier.
        for worker in &mut self.workers {
            worker.send(WorkerCommand::GetStats)?;
        }
        let mut env_stats = StatMap::new();
        for (slot, worker) in self.workers.iter_mut().enumerate() {
            match worker.recv(timeout)? {
                WorkerResponse::Stats(stats) => {
                    for (key, value) in stats {
                        *env_stats.entry(key).or_insert(0.0) += value;
                    }
                }
                other => return Err(unexpected(slot, "stats", other)),
            }
        }
        self.last_env_stats = env_stats;

        // Every worker exchange succeeded; account for the batch.
        if !test_mode {
            self.t_env += tally.env_steps;
        }

        tracing::debug!(
            test_mode,
            t_env = self.t_env,
            env_steps = tally.env_steps,
            max_len = batch.max_filled_len(),
            "collected batch"
        );

        self.finish_batch(policy, test_mode, &tally)?;
        Ok(batch)
    }

    /// Fold one batch into statistics, win rates, and maybe a flush.
    fn finish_batch<P>(
        &mut self,
        policy: &P,
        test_mode: bool,
        tally: &SlotTally,
    ) -> Result<(), RunnerError>
    where
        P: PolicyController + ?Sized,
    {
        let stats = if test_mode {
            &mut self.test_stats
        } else {
            &mut self.train_stats
        };
        stats.record_batch(&tally.final_infos, &tally.lengths, &tally.returns);

        if self.win_rates.scenario_count() > 0 {
            for (scenario, &won) in tally.scenarios.iter().zip(&tally.won) {
                if let Some(scenario) = scenario {
                    self.win_rates.record(*scenario, won)?;
                }
            }
        }

        let flush_eval =
            test_mode && self.test_stats.return_count() == self.config.test_episodes_per_round();
        let flush_train = !test_mode
            && self.last_train_flush.map_or(true, |last| {
                self.t_env.saturating_sub(last) >= self.config.runner_log_interval
            });

        let apply_win_rates = match self.config.win_rate_schedule {
            WinRateSchedule::EveryBatch => true,
            WinRateSchedule::OnEvaluationFlush => flush_eval,
        };
        if apply_win_rates && self.win_rates.has_pending() {
            self.win_rates.apply(self.t_env);
        }

        if flush_eval {
            let report = self.flush(true, None, None);
            self.last_test_return_mean = Some(report.return_mean);
            self.report = Some(report);
        } else if flush_train {
            let restarts = self.last_env_stats.get("restarts").copied();
            let report = self.flush(false, policy.epsilon(), restarts);
            self.last_train_flush = Some(self.t_env);
            self.report = Some(report);
        }
        Ok(())
    }

    fn flush(
        &mut self,
        test_mode: bool,
        epsilon: Option<f64>,
        forced_restarts: Option<f64>,
    ) -> RunReport {
        let stats = if test_mode {
            &mut self.test_stats
        } else {
            &mut self.train_stats
        };
        let summary = stats.flush();
        let report = RunReport {
            test_mode,
            t_env: self.t_env,
            n_episodes: summary.n_episodes,
            return_mean: summary.return_mean,
            return_std: summary.return_std,
            stat_means: summary.means,
            epsilon,
            forced_restarts,
            win_rates: self.win_rates.estimates().to_vec(),
        };
        tracing::info!(
            t_env = report.t_env,
            test_mode,
            n_episodes = report.n_episodes,
            return_mean = report.return_mean,
            return_std = report.return_std,
            "flushed episode statistics"
        );
        for (key, value) in report.entries() {
            tracing::debug!(t_env = report.t_env, key = %key, value, "stat");
        }
        report
    }

    /// Consume replies still in flight after an aborted collection.
    fn drain_pending(&mut self) {
        let timeout = self.config.response_timeout;
        for worker in &mut self.workers {
            if worker.is_pending() {
                if let Err(e) = worker.recv(timeout) {
                    tracing::warn!(rank = worker.rank(), error = %e, "could not drain worker reply");
                }
            }
        }
    }

    // ── Shutdown ────────────────────────────────────────────────

    /// Close every environment and join the worker threads.
    ///
    /// Every worker is asked to close even if an earlier one fails; the
    /// first failure is returned. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), RunnerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut first: Option<WorkerError> = None;
        for worker in &mut self.workers {
            if let Err(e) = worker.close(self.config.response_timeout) {
                tracing::warn!(rank = worker.rank(), error = %e, "worker did not close cleanly");
                first.get_or_insert(e);
            }
        }
        tracing::info!(workers = self.workers.len(), "worker pool closed");
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl Drop for ParallelRunner {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for ParallelRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelRunner")
            .field("batch_size", &self.workers.len())
            .field("episode_limit", &self.env_info.episode_limit)
            .field("t_env", &self.t_env)
            .field("closed", &self.closed)
            .finish()
    }
}

// ── Helpers ─────────────────────────────────────────────────────

/// Wait for every worker's startup report, then query metadata.
fn handshake(
    workers: &mut [WorkerHandle],
    config: &RunnerConfig,
) -> Result<(EnvInfo, Scheme), RunnerError> {
    let timeout = config.response_timeout;
    // Every worker is awaited even after a failure so none is left pending.
    let mut startup: Result<(), WorkerError> = Ok(());
    for worker in workers.iter_mut() {
        if let Err(e) = worker.wait_ready(timeout) {
            if startup.is_ok() {
                startup = Err(e);
            }
        }
    }
    startup?;

    let env_info = match workers[0].request(WorkerCommand::GetEnvInfo, timeout)? {
        WorkerResponse::EnvInfo(info) => info,
        other => return Err(unexpected(0, "env_info", other)),
    };
    let scheme = Scheme::from_env_info(&env_info, config.observation)?;
    Ok((env_info, scheme))
}

fn close_all(workers: &mut [WorkerHandle], timeout: Option<Duration>) {
    for worker in workers.iter_mut() {
        if let Err(e) = worker.close(timeout) {
            tracing::warn!(rank = worker.rank(), error = %e, "worker did not close cleanly");
        }
    }
}

/// Map a reply of the wrong kind to the appropriate error.
fn unexpected(slot: usize, expected: &'static str, got: WorkerResponse) -> RunnerError {
    match got {
        WorkerResponse::Failed(error) => RunnerError::Environment { slot, error },
        other => RunnerError::Worker(WorkerError::Protocol {
            rank: slot,
            expected,
            got: other.name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_defaults_to_test_mode() {
        assert_eq!(
            RunRequest::test().reset_options(),
            ResetOptions {
                test: true,
                index: None
            }
        );
        assert_eq!(
            RunRequest::train().reset_options(),
            ResetOptions {
                test: false,
                index: None
            }
        );
    }

    #[test]
    fn explicit_test_scenario_overrides_mode() {
        let opts = RunRequest::test()
            .with_test_scenario(false)
            .with_scenario_index(3)
            .reset_options();
        assert_eq!(
            opts,
            ResetOptions {
                test: false,
                index: Some(3)
            }
        );
    }

    #[test]
    fn failed_reply_maps_to_environment_error() {
        let e = unexpected(4, "step", WorkerResponse::Failed(EnvError::EpisodeOver));
        assert!(matches!(
            e,
            RunnerError::Environment {
                slot: 4,
                error: EnvError::EpisodeOver
            }
        ));
        let e = unexpected(1, "step", WorkerResponse::Closed);
        assert!(matches!(
            e,
            RunnerError::Worker(WorkerError::Protocol {
                rank: 1,
                expected: "step",
                got: "closed"
            })
        ));
    }
}
