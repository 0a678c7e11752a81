//! The [`PolicyController`] trait: the action-selecting collaborator.

use skirmish_batch::EpisodeBatch;
use skirmish_core::{AgentActions, PolicyError};

/// Multi-agent controller that picks actions from the batch collected so far.
///
/// The runner calls [`init_hidden`](Self::init_hidden) and
/// [`eval`](Self::eval) once before each collection, then
/// [`select_actions`](Self::select_actions) once per timestep until every
/// slot has terminated.
pub trait PolicyController {
    /// Reset recurrent state for `batch_size` parallel episodes.
    fn init_hidden(&mut self, batch_size: usize);

    /// Switch to inference mode (dropout and similar disabled).
    fn eval(&mut self) {}

    /// Switch back to training mode.
    fn train(&mut self) {}

    /// Choose actions for the slots in `active` at timestep `t_ep`.
    ///
    /// Returns one entry per element of `active`, in the same order, each
    /// holding one action per agent. `active` may include slots whose
    /// episode ended in the previous step; their actions are recorded but
    /// never sent to an environment.
    fn select_actions(
        &mut self,
        batch: &EpisodeBatch,
        t_ep: usize,
        t_env: u64,
        active: &[usize],
        test_mode: bool,
    ) -> Result<Vec<AgentActions>, PolicyError>;

    /// Current exploration rate, if the action selector has one.
    fn epsilon(&self) -> Option<f64> {
        None
    }
}

impl<P: PolicyController + ?Sized> PolicyController for Box<P> {
    fn init_hidden(&mut self, batch_size: usize) {
        (**self).init_hidden(batch_size)
    }
    fn eval(&mut self) {
        (**self).eval()
    }
    fn train(&mut self) {
        (**self).train()
    }
    fn select_actions(
        &mut self,
        batch: &EpisodeBatch,
        t_ep: usize,
        t_env: u64,
        active: &[usize],
        test_mode: bool,
    ) -> Result<Vec<AgentActions>, PolicyError> {
        (**self).select_actions(batch, t_ep, t_env, active, test_mode)
    }
    fn epsilon(&self) -> Option<f64> {
        (**self).epsilon()
    }
}
