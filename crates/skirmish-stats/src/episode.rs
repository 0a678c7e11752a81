//! Per-flush episode statistics.

use skirmish_core::{StatMap, StepInfo};

/// Summary produced when [`EpisodeStats`] is flushed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpisodeSummary {
    /// Mean undiscounted return over the flushed episodes.
    pub return_mean: f64,
    /// Population standard deviation of those returns.
    pub return_std: f64,
    /// Number of episodes covered by the summary.
    pub n_episodes: u64,
    /// `<key>_mean` for every accumulated info key, plus `ep_length_mean`,
    /// each divided by `n_episodes`.
    pub means: StatMap,
}

/// Accumulator for returns, lengths, and final-step info between flushes.
///
/// The runner keeps one instance for training batches and one for
/// evaluation batches. Each batch adds its final infos, episode lengths,
/// and returns; a flush turns the totals into per-episode means and clears
/// everything.
#[derive(Clone, Debug, Default)]
pub struct EpisodeStats {
    totals: StatMap,
    n_episodes: u64,
    ep_length: u64,
    returns: Vec<f64>,
}

impl EpisodeStats {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one collected batch into the accumulator.
    ///
    /// Every key of every final info is summed. `n_episodes` grows by the
    /// number of returns (one per slot); `ep_length` by the summed lengths.
    pub fn record_batch(&mut self, final_infos: &[StepInfo], lengths: &[usize], returns: &[f64]) {
        for info in final_infos {
            for (key, value) in info.iter() {
                *self.totals.entry(key.to_string()).or_insert(0.0) += value;
            }
        }
        self.n_episodes += returns.len() as u64;
        self.ep_length += lengths.iter().map(|&l| l as u64).sum::<u64>();
        self.returns.extend_from_slice(returns);
    }

    /// Number of returns collected since the last flush.
    pub fn return_count(&self) -> usize {
        self.returns.len()
    }

    /// Returns collected since the last flush.
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Episodes recorded since the last flush.
    pub fn n_episodes(&self) -> u64 {
        self.n_episodes
    }

    /// Summed episode length since the last flush.
    pub fn ep_length(&self) -> u64 {
        self.ep_length
    }

    /// Accumulated total for an info key.
    pub fn total(&self, key: &str) -> Option<f64> {
        self.totals.get(key).copied()
    }

    /// Whether nothing has been recorded since the last flush.
    pub fn is_empty(&self) -> bool {
        self.n_episodes == 0 && self.returns.is_empty()
    }

    /// Mean of the collected returns, `0.0` when there are none.
    pub fn return_mean(&self) -> f64 {
        mean(&self.returns)
    }

    /// Turn the accumulated totals into a summary and clear.
    pub fn flush(&mut self) -> EpisodeSummary {
        let denom = self.n_episodes.max(1) as f64;
        let mut means = StatMap::with_capacity(self.totals.len() + 1);
        for (key, total) in &self.totals {
            means.insert(format!("{key}_mean"), total / denom);
        }
        means.insert("ep_length_mean".to_string(), self.ep_length as f64 / denom);
        let summary = EpisodeSummary {
            return_mean: mean(&self.returns),
            return_std: std_dev(&self.returns),
            n_episodes: self.n_episodes,
            means,
        };
        *self = Self::default();
        summary
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
