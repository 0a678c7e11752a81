//! Runner configuration, validation, and error types.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use skirmish_core::ObservationKind;
use skirmish_stats::{StatsError, UpdateRule, WinRateSchedule};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`RunnerConfig::validate()`].
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// `batch_size_run` is zero.
    ZeroBatchSize,
    /// `response_timeout` is `Some(Duration::ZERO)`.
    ZeroTimeout,
    /// The win-rate update rule's parameters are unusable.
    InvalidWinRateRule {
        /// Description of the problem.
        reason: String,
    },
    /// `initial_win_rates` has the wrong number of entries.
    InitialWinRatesLength {
        /// Configured scenario count.
        expected: usize,
        /// Number of initial estimates supplied.
        found: usize,
    },
    /// An initial win-rate estimate lies outside `[0, 1]`.
    InvalidInitialWinRate {
        /// Scenario index of the offending value.
        index: usize,
        /// The offending value.
        value: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBatchSize => write!(f, "batch_size_run must be at least 1"),
            Self::ZeroTimeout => write!(f, "response_timeout must be non-zero when set"),
            Self::InvalidWinRateRule { reason } => {
                write!(f, "invalid win-rate rule: {reason}")
            }
            Self::InitialWinRatesLength { expected, found } => write!(
                f,
                "initial_win_rates has {found} entries, scenario_count is {expected}"
            ),
            Self::InvalidInitialWinRate { index, value } => {
                write!(f, "initial win rate {value} for scenario {index} is outside [0, 1]")
            }
        }
    }
}

impl Error for ConfigError {}

// ── RunnerConfig ───────────────────────────────────────────────────

/// Complete configuration for a [`ParallelRunner`](crate::ParallelRunner).
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Number of parallel episode slots (one worker each). Default: 8.
    pub batch_size_run: usize,
    /// Observation representation requested from workers. Default: entity.
    pub observation: ObservationKind,
    /// Worker `r` builds its environment with seed `base_seed + r`.
    pub base_seed: u64,
    /// Episodes per evaluation round; rounded down to a multiple of the
    /// batch size (at least one batch). Default: 32.
    pub test_nepisode: usize,
    /// Minimum environment steps between training log flushes.
    /// Default: 10 000.
    pub runner_log_interval: u64,
    /// Number of scenarios tracked by the win-rate estimator. Zero disables
    /// tracking. Default: 0.
    pub scenario_count: usize,
    /// How per-batch win rates are folded into the estimates.
    pub win_rate_rule: UpdateRule,
    /// When pending win-rate outcomes are applied.
    pub win_rate_schedule: WinRateSchedule,
    /// Maximum wait for any single worker reply. `None` blocks forever.
    pub response_timeout: Option<Duration>,
    /// Estimates restored from a previous run, one per scenario.
    pub initial_win_rates: Option<Vec<f64>>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size_run: 8,
            observation: ObservationKind::Entity,
            base_seed: 0,
            test_nepisode: 32,
            runner_log_interval: 10_000,
            scenario_count: 0,
            win_rate_rule: UpdateRule::default(),
            win_rate_schedule: WinRateSchedule::default(),
            response_timeout: None,
            initial_win_rates: None,
        }
    }
}

impl RunnerConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. At least one slot.
        if self.batch_size_run == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        // 2. A zero timeout would fail every receive.
        if self.response_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        // 3. Update rule parameters.
        self.win_rate_rule.validate().map_err(|e| match e {
            StatsError::InvalidRule { reason } => ConfigError::InvalidWinRateRule { reason },
            other => ConfigError::InvalidWinRateRule {
                reason: other.to_string(),
            },
        })?;
        // 4. Restored estimates must match the scenario count and range.
        if let Some(initial) = &self.initial_win_rates {
            if initial.len() != self.scenario_count {
                return Err(ConfigError::InitialWinRatesLength {
                    expected: self.scenario_count,
                    found: initial.len(),
                });
            }
            if let Some((index, &value)) = initial
                .iter()
                .enumerate()
                .find(|(_, v)| !(0.0..=1.0).contains(*v))
            {
                return Err(ConfigError::InvalidInitialWinRate { index, value });
            }
        }
        Ok(())
    }

    /// Number of evaluation episodes that completes one evaluation round.
    pub fn test_episodes_per_round(&self) -> usize {
        (self.test_nepisode / self.batch_size_run.max(1)).max(1) * self.batch_size_run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(RunnerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_batch_size_rejected() {
        let cfg = RunnerConfig {
            batch_size_run: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroBatchSize));
    }

    #[test]
    fn zero_timeout_rejected() {
        let cfg = RunnerConfig {
            response_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn bad_beta_rejected() {
        let cfg = RunnerConfig {
            win_rate_rule: UpdateRule::BetaSmoothing { beta: -0.5 },
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidWinRateRule { .. })
        ));
    }

    #[test]
    fn initial_win_rates_checked() {
        let cfg = RunnerConfig {
            scenario_count: 2,
            initial_win_rates: Some(vec![0.5]),
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InitialWinRatesLength {
                expected: 2,
                found: 1
            })
        );

        let cfg = RunnerConfig {
            scenario_count: 2,
            initial_win_rates: Some(vec![0.5, 1.5]),
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InvalidInitialWinRate {
                index: 1,
                value: 1.5
            })
        );
    }

    #[test]
    fn test_round_is_whole_batches() {
        let mut cfg = RunnerConfig {
            batch_size_run: 8,
            test_nepisode: 20,
            ..Default::default()
        };
        assert_eq!(cfg.test_episodes_per_round(), 16);
        cfg.test_nepisode = 3;
        assert_eq!(cfg.test_episodes_per_round(), 8);
    }
}
