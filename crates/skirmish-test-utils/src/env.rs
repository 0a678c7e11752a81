//! Scripted and random environments.
//!
//! - [`ScriptedEnv`]: deterministic episode length, outcome, and failure
//!   injection, with every command recorded in a shared [`CallLog`].
//! - [`RandomEnv`]: seeded stochastic episodes for accounting tests.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_core::{
    info_keys, names, EntityMasks, EnvError, EnvInfo, Environment, ResetOptions, ScenarioId,
    StatMap, StepInfo, StepOutcome, WorkerSeed,
};

/// One environment call as seen by a scripted environment.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Reset(ResetOptions),
    Step(Vec<u32>),
    Stats,
    EnvInfo,
    Close,
}

/// Thread-safe record of `(rank, call)` pairs across all workers.
#[derive(Clone, Debug, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(usize, Call)>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, rank: usize, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((rank, call));
    }

    /// Snapshot of every recorded call, in arrival order.
    pub fn calls(&self) -> Vec<(usize, Call)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(usize, &Call) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(rank, call)| pred(*rank, call))
            .count()
    }

    pub fn steps(&self) -> usize {
        self.count(|_, c| matches!(c, Call::Step(_)))
    }

    pub fn steps_for(&self, rank: usize) -> usize {
        self.count(|r, c| r == rank && matches!(c, Call::Step(_)))
    }

    pub fn stats_for(&self, rank: usize) -> usize {
        self.count(|r, c| r == rank && matches!(c, Call::Stats))
    }

    pub fn resets(&self) -> usize {
        self.count(|_, c| matches!(c, Call::Reset(_)))
    }

    pub fn closes(&self) -> usize {
        self.count(|_, c| matches!(c, Call::Close))
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

// ── ScriptedEnv ─────────────────────────────────────────────────

/// Behaviour of one [`ScriptedEnv`].
#[derive(Clone, Debug)]
pub struct Script {
    pub info: EnvInfo,
    /// Episode ends on this step (1-based).
    pub terminate_at: usize,
    /// Report the final step as a horizon truncation.
    pub truncated: bool,
    pub battle_won: bool,
    pub reward: f32,
    pub scenario: Option<ScenarioId>,
    pub restarts: f64,
    /// Observation field this environment never provides.
    pub omit_field: Option<&'static str>,
    /// Step (1-based) that returns a simulation error.
    pub fail_on_step: Option<usize>,
    /// Step (1-based) that panics the worker thread.
    pub panic_on_step: Option<usize>,
    /// Sleep before every step.
    pub step_delay: Option<Duration>,
}

impl Script {
    pub fn new(info: EnvInfo, terminate_at: usize) -> Self {
        Self {
            info,
            terminate_at,
            truncated: false,
            battle_won: false,
            reward: 1.0,
            scenario: None,
            restarts: 0.0,
            omit_field: None,
            fail_on_step: None,
            panic_on_step: None,
            step_delay: None,
        }
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    pub fn won(mut self) -> Self {
        self.battle_won = true;
        self
    }

    pub fn reward(mut self, reward: f32) -> Self {
        self.reward = reward;
        self
    }

    pub fn scenario(mut self, scenario: u32) -> Self {
        self.scenario = Some(ScenarioId(scenario));
        self
    }

    pub fn restarts(mut self, restarts: f64) -> Self {
        self.restarts = restarts;
        self
    }

    pub fn omit(mut self, field: &'static str) -> Self {
        self.omit_field = Some(field);
        self
    }

    pub fn fail_on_step(mut self, step: usize) -> Self {
        self.fail_on_step = Some(step);
        self
    }

    pub fn panic_on_step(mut self, step: usize) -> Self {
        self.panic_on_step = Some(step);
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }
}

/// Deterministic environment driven by a [`Script`].
///
/// Observations encode the step count: every entity, state, and obs value
/// at timestep `t` equals `t`. The last action of every agent is
/// unavailable.
pub struct ScriptedEnv {
    rank: usize,
    script: Script,
    log: CallLog,
    t: usize,
    done: bool,
}

impl ScriptedEnv {
    pub fn new(rank: usize, script: Script, log: CallLog) -> Self {
        Self {
            rank,
            script,
            log,
            t: 0,
            done: false,
        }
    }

    /// Factory for a runner: worker `r` gets `scripts[r]`.
    pub fn factory(
        scripts: Vec<Script>,
        log: CallLog,
    ) -> impl Fn(WorkerSeed) -> Result<ScriptedEnv, EnvError> + Send + Sync + 'static {
        move |seed: WorkerSeed| {
            let script = scripts
                .get(seed.rank)
                .cloned()
                .ok_or_else(|| EnvError::Construction {
                    reason: format!("no script for worker {}", seed.rank),
                })?;
            Ok(ScriptedEnv::new(seed.rank, script, log.clone()))
        }
    }

    fn provides(&self, field: &str) -> bool {
        self.script.omit_field != Some(field)
    }
}

impl Environment for ScriptedEnv {
    fn env_info(&self) -> EnvInfo {
        self.log.push(self.rank, Call::EnvInfo);
        self.script.info.clone()
    }

    fn reset(&mut self, options: &ResetOptions) -> Result<(), EnvError> {
        self.log.push(self.rank, Call::Reset(options.clone()));
        self.t = 0;
        self.done = false;
        Ok(())
    }

    fn step(&mut self, actions: &[u32]) -> Result<StepOutcome, EnvError> {
        if let Some(delay) = self.script.step_delay {
            thread::sleep(delay);
        }
        self.log.push(self.rank, Call::Step(actions.to_vec()));
        if self.done {
            return Err(EnvError::EpisodeOver);
        }
        if actions.len() != self.script.info.n_agents {
            return Err(EnvError::InvalidActions {
                expected: self.script.info.n_agents,
                got: actions.len(),
            });
        }
        self.t += 1;
        if self.script.panic_on_step == Some(self.t) {
            panic!("scripted panic at step {}", self.t);
        }
        if self.script.fail_on_step == Some(self.t) {
            return Err(EnvError::Simulation {
                reason: format!("scripted failure at step {}", self.t),
            });
        }
        let terminated = self.t >= self.script.terminate_at;
        let mut info = StepInfo::new();
        if terminated {
            self.done = true;
            info.insert(
                info_keys::BATTLE_WON,
                if self.script.battle_won { 1.0 } else { 0.0 },
            );
            if self.script.truncated {
                info.insert(info_keys::EPISODE_LIMIT, 1.0);
            }
        }
        Ok(StepOutcome {
            reward: self.script.reward,
            terminated,
            info,
        })
    }

    fn avail_actions(&self) -> Vec<f32> {
        let info = &self.script.info;
        let mut avail = vec![1.0; info.n_agents * info.n_actions];
        if info.n_actions > 1 {
            for agent in 0..info.n_agents {
                avail[agent * info.n_actions + info.n_actions - 1] = 0.0;
            }
        }
        avail
    }

    fn entities(&self) -> Option<Vec<f32>> {
        let info = &self.script.info;
        (info.n_entities > 0 && self.provides(names::ENTITIES))
            .then(|| vec![self.t as f32; info.n_entities * info.entity_dim])
    }

    fn masks(&self) -> Option<EntityMasks> {
        let info = &self.script.info;
        let n = info.n_entities;
        (n > 0 && self.provides(names::OBS_MASK) && self.provides(names::ENTITY_MASK)).then(|| {
            EntityMasks {
                obs_mask: vec![0.0; n * n],
                entity_mask: vec![0.0; n],
                gt_mask: info.has_gt_mask.then(|| vec![0.0; n * n]),
            }
        })
    }

    fn state(&self) -> Option<Vec<f32>> {
        let info = &self.script.info;
        (info.state_dim > 0 && self.provides(names::STATE))
            .then(|| vec![self.t as f32; info.state_dim])
    }

    fn obs(&self) -> Option<Vec<f32>> {
        let info = &self.script.info;
        (info.obs_dim > 0 && self.provides(names::OBS))
            .then(|| vec![self.t as f32; info.n_agents * info.obs_dim])
    }

    fn scenario(&self) -> Option<ScenarioId> {
        self.script.scenario
    }

    fn stats(&self) -> StatMap {
        self.log.push(self.rank, Call::Stats);
        let mut stats = StatMap::new();
        stats.insert("restarts".to_string(), self.script.restarts);
        stats
    }

    fn close(&mut self) {
        self.log.push(self.rank, Call::Close);
    }
}

// ── RandomEnv ───────────────────────────────────────────────────

/// Stochastic entity-scheme environment seeded from its [`WorkerSeed`].
///
/// Each step ends the episode with probability `p_end`; episodes that
/// survive to `episode_limit` are truncated. Scenarios are drawn
/// uniformly from `0..scenario_count` unless the reset forces an index.
pub struct RandomEnv {
    info: EnvInfo,
    rng: ChaCha8Rng,
    p_end: f64,
    scenario_count: u32,
    t: usize,
    done: bool,
    scenario: Option<ScenarioId>,
    episodes: u64,
}

impl RandomEnv {
    pub fn new(info: EnvInfo, seed: WorkerSeed, p_end: f64, scenario_count: u32) -> Self {
        Self {
            info,
            rng: ChaCha8Rng::seed_from_u64(seed.seed),
            p_end,
            scenario_count,
            t: 0,
            done: false,
            scenario: None,
            episodes: 0,
        }
    }
}

impl Environment for RandomEnv {
    fn env_info(&self) -> EnvInfo {
        self.info.clone()
    }

    fn reset(&mut self, options: &ResetOptions) -> Result<(), EnvError> {
        self.t = 0;
        self.done = false;
        self.episodes += 1;
        self.scenario = match options.index {
            Some(index) => Some(ScenarioId(index as u32)),
            None if self.scenario_count > 0 => {
                Some(ScenarioId(self.rng.random_range(0..self.scenario_count)))
            }
            None => None,
        };
        Ok(())
    }

    fn step(&mut self, actions: &[u32]) -> Result<StepOutcome, EnvError> {
        if self.done {
            return Err(EnvError::EpisodeOver);
        }
        if actions.len() != self.info.n_agents {
            return Err(EnvError::InvalidActions {
                expected: self.info.n_agents,
                got: actions.len(),
            });
        }
        self.t += 1;
        let ended = self.rng.random_bool(self.p_end);
        let truncated = !ended && self.t >= self.info.episode_limit;
        let mut info = StepInfo::new();
        if ended || truncated {
            self.done = true;
            let won = ended && self.rng.random_bool(0.5);
            info.insert(info_keys::BATTLE_WON, if won { 1.0 } else { 0.0 });
            if truncated {
                info.insert(info_keys::EPISODE_LIMIT, 1.0);
            }
        }
        Ok(StepOutcome {
            reward: self.rng.random::<f32>(),
            terminated: self.done,
            info,
        })
    }

    fn avail_actions(&self) -> Vec<f32> {
        vec![1.0; self.info.n_agents * self.info.n_actions]
    }

    fn entities(&self) -> Option<Vec<f32>> {
        Some(vec![self.t as f32; self.info.n_entities * self.info.entity_dim])
    }

    fn masks(&self) -> Option<EntityMasks> {
        let n = self.info.n_entities;
        Some(EntityMasks {
            obs_mask: vec![0.0; n * n],
            entity_mask: vec![0.0; n],
            gt_mask: None,
        })
    }

    fn scenario(&self) -> Option<ScenarioId> {
        self.scenario
    }

    fn stats(&self) -> StatMap {
        let mut stats = StatMap::new();
        stats.insert("episodes".to_string(), self.episodes as f64);
        stats
    }
}
