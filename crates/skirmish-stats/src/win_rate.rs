//! Per-scenario win-rate estimates.
//!
//! During collection the runner records one battle outcome per finished
//! episode against the scenario that episode was reset into. Applying an
//! update turns those outcomes into per-scenario means and folds them into
//! the long-lived estimate vector with the configured [`UpdateRule`].
//! Scenarios with no episodes since the last update keep their estimate.

use std::io::{Read, Write};

use skirmish_core::ScenarioId;

use crate::codec;
use crate::error::StatsError;

/// How per-batch means are folded into the estimates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UpdateRule {
    /// Exponential smoothing: `e = (1 - beta) * e + beta * m`.
    BetaSmoothing {
        /// Weight given to the new batch mean, in `[0, 1]`.
        beta: f64,
    },
    /// Step towards the mean with a rate that decays with training time:
    /// `e += alpha * (m - e)`, `alpha = min(test_interval, t_env) / t_env`.
    ///
    /// At `t_env == 0` the rate is `1`.
    AdaptiveStep {
        /// Environment steps between evaluation rounds.
        test_interval: u64,
    },
}

impl UpdateRule {
    /// Check the rule's parameters.
    pub fn validate(&self) -> Result<(), StatsError> {
        match *self {
            Self::BetaSmoothing { beta } => {
                if !(0.0..=1.0).contains(&beta) {
                    return Err(StatsError::InvalidRule {
                        reason: format!("beta must be in [0, 1], got {beta}"),
                    });
                }
            }
            Self::AdaptiveStep { test_interval } => {
                if test_interval == 0 {
                    return Err(StatsError::InvalidRule {
                        reason: "test_interval must be at least 1".into(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The step size this rule applies at `t_env`.
    pub fn rate(&self, t_env: u64) -> f64 {
        match *self {
            Self::BetaSmoothing { beta } => beta,
            Self::AdaptiveStep { test_interval } => {
                if t_env == 0 {
                    1.0
                } else {
                    test_interval.min(t_env) as f64 / t_env as f64
                }
            }
        }
    }
}

impl Default for UpdateRule {
    fn default() -> Self {
        Self::BetaSmoothing { beta: 0.1 }
    }
}

/// When the runner applies pending win-rate updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WinRateSchedule {
    /// After every collected batch, train or eval.
    #[default]
    EveryBatch,
    /// Only when an evaluation round flushes its statistics. Outcomes from
    /// every batch in between accumulate.
    OnEvaluationFlush,
}

/// Smoothed per-scenario win-rate estimates.
///
/// Every estimate stays in `[0, 1]`: outcomes are binary, means are
/// convex combinations of outcomes, and both update rules blend with a
/// rate in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct WinRateTracker {
    estimates: Vec<f64>,
    wins: Vec<f64>,
    counts: Vec<u32>,
    rule: UpdateRule,
}

impl WinRateTracker {
    /// Create a tracker with all estimates at zero.
    pub fn new(scenario_count: usize, rule: UpdateRule) -> Result<Self, StatsError> {
        Self::from_estimates(vec![0.0; scenario_count], rule)
    }

    /// Restore a tracker from previously saved estimates.
    ///
    /// # Errors
    ///
    /// [`StatsError::OutOfRange`] if any value is outside `[0, 1]`,
    /// [`StatsError::InvalidRule`] if the rule is unusable.
    pub fn from_estimates(estimates: Vec<f64>, rule: UpdateRule) -> Result<Self, StatsError> {
        rule.validate()?;
        validate_range(&estimates)?;
        let n = estimates.len();
        Ok(Self {
            estimates,
            wins: vec![0.0; n],
            counts: vec![0; n],
            rule,
        })
    }

    /// Number of scenarios tracked.
    pub fn scenario_count(&self) -> usize {
        self.estimates.len()
    }

    /// The configured update rule.
    pub fn rule(&self) -> UpdateRule {
        self.rule
    }

    /// Current estimate vector.
    pub fn estimates(&self) -> &[f64] {
        &self.estimates
    }

    /// Current estimate for one scenario.
    pub fn estimate(&self, scenario: ScenarioId) -> Option<f64> {
        self.estimates.get(scenario.index()).copied()
    }

    /// Record one episode outcome for `scenario`.
    pub fn record(&mut self, scenario: ScenarioId, won: bool) -> Result<(), StatsError> {
        let index = scenario.index();
        if index >= self.estimates.len() {
            return Err(StatsError::UnknownScenario {
                index,
                scenario_count: self.estimates.len(),
            });
        }
        if won {
            self.wins[index] += 1.0;
        }
        self.counts[index] += 1;
        Ok(())
    }

    /// Whether outcomes have been recorded since the last [`apply`](Self::apply).
    pub fn has_pending(&self) -> bool {
        self.counts.iter().any(|&c| c > 0)
    }

    /// Fold pending outcomes into the estimates and clear them.
    ///
    /// Only scenarios with at least one recorded outcome are updated.
    /// Returns the number of scenarios touched.
    pub fn apply(&mut self, t_env: u64) -> usize {
        let rate = self.rule.rate(t_env);
        let mut touched = 0;
        for ((estimate, wins), count) in self
            .estimates
            .iter_mut()
            .zip(self.wins.iter_mut())
            .zip(self.counts.iter_mut())
        {
            if *count > 0 {
                let batch_mean = *wins / f64::from((*count).max(1));
                *estimate = ((1.0 - rate) * *estimate + rate * batch_mean).clamp(0.0, 1.0);
                touched += 1;
            }
            *wins = 0.0;
            *count = 0;
        }
        tracing::debug!(t_env, rate, touched, "applied win-rate update");
        touched
    }

    /// Write the estimate vector as a checkpoint.
    pub fn save(&self, w: &mut dyn Write) -> Result<(), StatsError> {
        codec::write_header(w)?;
        codec::write_f64_vec(w, &self.estimates)
    }

    /// Read a checkpoint written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// [`StatsError::LengthMismatch`] if the checkpoint holds a different
    /// number of scenarios, [`StatsError::OutOfRange`] if any value is
    /// outside `[0, 1]`, plus header and I/O errors.
    pub fn load(
        r: &mut dyn Read,
        scenario_count: usize,
        rule: UpdateRule,
    ) -> Result<Self, StatsError> {
        codec::read_header(r)?;
        let estimates = codec::read_f64_vec(r, scenario_count)?;
        Self::from_estimates(estimates, rule)
    }
}

fn validate_range(values: &[f64]) -> Result<(), StatsError> {
    for (index, &value) in values.iter().enumerate() {
        if !(0.0..=1.0).contains(&value) {
            return Err(StatsError::OutOfRange { index, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beta(b: f64) -> UpdateRule {
        UpdateRule::BetaSmoothing { beta: b }
    }

    #[test]
    fn beta_update_touches_only_recorded_scenarios() {
        let mut t = WinRateTracker::new(2, beta(0.1)).unwrap();
        t.record(ScenarioId(0), true).unwrap();
        assert_eq!(t.apply(0), 1);
        assert!((t.estimates()[0] - 0.1).abs() < 1e-12);
        assert_eq!(t.estimates()[1], 0.0);
    }

    #[test]
    fn beta_zero_is_idempotent() {
        let mut t = WinRateTracker::from_estimates(vec![0.3, 0.7], beta(0.0)).unwrap();
        t.record(ScenarioId(0), true).unwrap();
        t.record(ScenarioId(1), false).unwrap();
        t.apply(100);
        assert_eq!(t.estimates(), &[0.3, 0.7]);
    }

    #[test]
    fn beta_one_replaces_with_batch_mean() {
        let mut t = WinRateTracker::from_estimates(vec![0.3, 0.7], beta(1.0)).unwrap();
        t.record(ScenarioId(0), true).unwrap();
        t.record(ScenarioId(0), false).unwrap();
        t.record(ScenarioId(0), true).unwrap();
        t.record(ScenarioId(0), true).unwrap();
        t.apply(100);
        assert_eq!(t.estimates(), &[0.75, 0.7]);
    }

    #[test]
    fn adaptive_step_full_replacement_at_test_interval() {
        let rule = UpdateRule::AdaptiveStep {
            test_interval: 2000,
        };
        let mut t = WinRateTracker::from_estimates(vec![0.9], rule).unwrap();
        t.record(ScenarioId(0), false).unwrap();
        t.record(ScenarioId(0), true).unwrap();
        t.apply(2000);
        assert_eq!(t.estimates(), &[0.5]);
    }

    #[test]
    fn adaptive_step_decays_with_t_env() {
        let rule = UpdateRule::AdaptiveStep { test_interval: 100 };
        assert_eq!(rule.rate(0), 1.0);
        assert_eq!(rule.rate(50), 1.0);
        assert_eq!(rule.rate(400), 0.25);

        let mut t = WinRateTracker::new(1, rule).unwrap();
        t.record(ScenarioId(0), true).unwrap();
        t.apply(400);
        assert_eq!(t.estimates(), &[0.25]);
    }

    #[test]
    fn apply_clears_pending_outcomes() {
        let mut t = WinRateTracker::new(2, beta(0.5)).unwrap();
        t.record(ScenarioId(1), true).unwrap();
        assert!(t.has_pending());
        t.apply(0);
        assert!(!t.has_pending());
        assert_eq!(t.apply(0), 0);
        assert_eq!(t.estimates(), &[0.0, 0.5]);
    }

    #[test]
    fn unknown_scenario_rejected() {
        let mut t = WinRateTracker::new(2, beta(0.1)).unwrap();
        assert!(matches!(
            t.record(ScenarioId(2), true),
            Err(StatsError::UnknownScenario {
                index: 2,
                scenario_count: 2
            })
        ));
    }

    #[test]
    fn invalid_rules_rejected() {
        assert!(WinRateTracker::new(1, beta(1.5)).is_err());
        assert!(WinRateTracker::new(1, beta(f64::NAN)).is_err());
        assert!(WinRateTracker::new(1, UpdateRule::AdaptiveStep { test_interval: 0 }).is_err());
    }

    #[test]
    fn out_of_range_estimates_rejected() {
        assert!(matches!(
            WinRateTracker::from_estimates(vec![0.5, 1.2], beta(0.1)),
            Err(StatsError::OutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn checkpoint_restores_estimates() {
        let t = WinRateTracker::from_estimates(vec![0.125, 0.5, 1.0], beta(0.1)).unwrap();
        let mut buf = Vec::new();
        t.save(&mut buf).unwrap();
        let restored = WinRateTracker::load(&mut buf.as_slice(), 3, beta(0.1)).unwrap();
        assert_eq!(restored.estimates(), t.estimates());
    }

    #[test]
    fn checkpoint_with_wrong_scenario_count_rejected() {
        let t = WinRateTracker::new(3, beta(0.1)).unwrap();
        let mut buf = Vec::new();
        t.save(&mut buf).unwrap();
        assert!(matches!(
            WinRateTracker::load(&mut buf.as_slice(), 4, beta(0.1)),
            Err(StatsError::LengthMismatch {
                expected: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn checkpoint_with_corrupt_value_rejected() {
        let mut buf = Vec::new();
        codec::write_header(&mut buf).unwrap();
        codec::write_f64_vec(&mut buf, &[0.5, -0.1]).unwrap();
        assert!(matches!(
            WinRateTracker::load(&mut buf.as_slice(), 2, beta(0.1)),
            Err(StatsError::OutOfRange { index: 1, .. })
        ));
    }

    mod proptests {
        use crate::win_rate::{UpdateRule, WinRateTracker};
        use proptest::prelude::*;
        use skirmish_core::ScenarioId;

        fn rule() -> impl Strategy<Value = UpdateRule> {
            prop_oneof![
                (0.0f64..=1.0).prop_map(|beta| UpdateRule::BetaSmoothing { beta }),
                (1u64..10_000).prop_map(|test_interval| UpdateRule::AdaptiveStep { test_interval }),
            ]
        }

        proptest! {
            #[test]
            fn estimates_stay_in_unit_interval(
                rule in rule(),
                initial in proptest::collection::vec(0.0f64..=1.0, 1..6),
                rounds in proptest::collection::vec(
                    (proptest::collection::vec((any::<usize>(), any::<bool>()), 0..16), 0u64..100_000),
                    1..8,
                ),
            ) {
                let n = initial.len();
                let mut t = WinRateTracker::from_estimates(initial, rule).unwrap();
                for (outcomes, t_env) in rounds {
                    for (s, won) in outcomes {
                        t.record(ScenarioId((s % n) as u32), won).unwrap();
                    }
                    t.apply(t_env);
                    for &e in t.estimates() {
                        prop_assert!((0.0..=1.0).contains(&e));
                    }
                }
            }

            #[test]
            fn untouched_scenarios_keep_their_estimate(
                rule in rule(),
                initial in proptest::collection::vec(0.0f64..=1.0, 2..6),
                t_env in 0u64..100_000,
                won in any::<bool>(),
            ) {
                let mut t = WinRateTracker::from_estimates(initial.clone(), rule).unwrap();
                t.record(ScenarioId(0), won).unwrap();
                t.apply(t_env);
                prop_assert_eq!(&t.estimates()[1..], &initial[1..]);
            }
        }
    }
}
