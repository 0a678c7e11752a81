//! Policy controllers that read `avail_actions` straight from the batch.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skirmish_batch::EpisodeBatch;
use skirmish_core::{names, AgentActions, PolicyError};
use skirmish_runner::PolicyController;

/// Read the avail-actions row for `(slot, t)` from the batch.
fn avail_row<'b>(batch: &'b EpisodeBatch, slot: usize, t: usize) -> Result<&'b [f32], PolicyError> {
    batch
        .get(names::AVAIL_ACTIONS, slot, t)
        .map_err(|e| PolicyError::MissingInput {
            field: format!("{} ({e})", names::AVAIL_ACTIONS),
        })
}

/// Deterministic controller: every agent takes its first available action.
///
/// Records each `select_actions` call so tests can assert on the
/// timestep and active set the runner passed in.
#[derive(Debug, Default)]
pub struct FirstAvailablePolicy {
    pub n_agents: usize,
    pub n_actions: usize,
    pub epsilon: Option<f64>,
    /// Extra action vectors appended to every reply, to provoke a count
    /// mismatch.
    pub extra_actions: usize,
    /// `(t_ep, t_env, active, test_mode)` per call.
    pub calls: Vec<(usize, u64, Vec<usize>, bool)>,
    pub init_hidden_calls: Vec<usize>,
    pub eval_calls: usize,
}

impl FirstAvailablePolicy {
    pub fn new(n_agents: usize, n_actions: usize) -> Self {
        Self {
            n_agents,
            n_actions,
            ..Default::default()
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }
}

impl PolicyController for FirstAvailablePolicy {
    fn init_hidden(&mut self, batch_size: usize) {
        self.init_hidden_calls.push(batch_size);
    }

    fn eval(&mut self) {
        self.eval_calls += 1;
    }

    fn select_actions(
        &mut self,
        batch: &EpisodeBatch,
        t_ep: usize,
        t_env: u64,
        active: &[usize],
        test_mode: bool,
    ) -> Result<Vec<AgentActions>, PolicyError> {
        self.calls.push((t_ep, t_env, active.to_vec(), test_mode));
        let mut out = Vec::with_capacity(active.len() + self.extra_actions);
        for &slot in active {
            let avail = avail_row(batch, slot, t_ep)?;
            let actions = (0..self.n_agents)
                .map(|agent| {
                    let row = &avail[agent * self.n_actions..(agent + 1) * self.n_actions];
                    row.iter().position(|&a| a > 0.0).unwrap_or(0) as u32
                })
                .collect();
            out.push(actions);
        }
        for _ in 0..self.extra_actions {
            out.push(smallvec::smallvec![0; self.n_agents]);
        }
        Ok(out)
    }

    fn epsilon(&self) -> Option<f64> {
        self.epsilon
    }
}

/// Uniform random choice among available actions, seeded for
/// reproducibility.
#[derive(Debug)]
pub struct RandomPolicy {
    n_agents: usize,
    n_actions: usize,
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new(n_agents: usize, n_actions: usize, seed: u64) -> Self {
        Self {
            n_agents,
            n_actions,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl PolicyController for RandomPolicy {
    fn init_hidden(&mut self, _batch_size: usize) {}

    fn select_actions(
        &mut self,
        batch: &EpisodeBatch,
        t_ep: usize,
        _t_env: u64,
        active: &[usize],
        _test_mode: bool,
    ) -> Result<Vec<AgentActions>, PolicyError> {
        let mut out = Vec::with_capacity(active.len());
        for &slot in active {
            let avail = avail_row(batch, slot, t_ep)?;
            let mut actions = AgentActions::new();
            for agent in 0..self.n_agents {
                let row = &avail[agent * self.n_actions..(agent + 1) * self.n_actions];
                let choices: Vec<u32> = row
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| **a > 0.0)
                    .map(|(i, _)| i as u32)
                    .collect();
                if choices.is_empty() {
                    return Err(PolicyError::SelectionFailed {
                        reason: format!("slot {slot} agent {agent} has no available action"),
                    });
                }
                actions.push(choices[self.rng.random_range(0..choices.len())]);
            }
            out.push(actions);
        }
        Ok(out)
    }

    fn epsilon(&self) -> Option<f64> {
        Some(1.0)
    }
}
