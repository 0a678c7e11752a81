//! Log-flush reports.

use skirmish_core::StatMap;

/// Statistics produced when the runner flushes its accumulators.
///
/// Keys follow the `<prefix><name>` convention where the prefix is `test_`
/// for evaluation reports and empty for training reports.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Whether this report covers evaluation episodes.
    pub test_mode: bool,
    /// Training environment steps at flush time.
    pub t_env: u64,
    /// Episodes covered.
    pub n_episodes: u64,
    /// Mean undiscounted return.
    pub return_mean: f64,
    /// Population standard deviation of returns.
    pub return_std: f64,
    /// `<key>_mean` per accumulated info key, plus `ep_length_mean`.
    pub stat_means: StatMap,
    /// Policy exploration rate (training reports only).
    pub epsilon: Option<f64>,
    /// Sum of `restarts` across workers for the last batch (training
    /// reports only, when workers report it).
    pub forced_restarts: Option<f64>,
    /// Win-rate estimates at flush time.
    pub win_rates: Vec<f64>,
}

impl RunReport {
    /// Key prefix for this report.
    pub fn prefix(&self) -> &'static str {
        if self.test_mode {
            "test_"
        } else {
            ""
        }
    }

    /// Flatten the report into prefixed `(key, value)` pairs.
    pub fn entries(&self) -> Vec<(String, f64)> {
        let prefix = self.prefix();
        let mut out = Vec::with_capacity(self.stat_means.len() + 4);
        out.push((format!("{prefix}return_mean"), self.return_mean));
        out.push((format!("{prefix}return_std"), self.return_std));
        for (key, value) in &self.stat_means {
            out.push((format!("{prefix}{key}"), *value));
        }
        if let Some(epsilon) = self.epsilon {
            out.push(("epsilon".to_string(), epsilon));
        }
        if let Some(restarts) = self.forced_restarts {
            out.push(("forced_restarts".to_string(), restarts));
        }
        out
    }

    /// Look up one flattened entry by its prefixed key.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}
