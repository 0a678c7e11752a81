//! Error types for statistics and win-rate checkpoints.

use std::fmt;
use std::io;

/// Errors from the win-rate tracker and its checkpoint codec.
#[derive(Debug)]
pub enum StatsError {
    /// An I/O error occurred while reading or writing a checkpoint.
    Io(io::Error),
    /// The checkpoint does not start with the expected `b"SKWR"` magic bytes.
    InvalidMagic,
    /// The checkpoint format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the checkpoint.
        found: u8,
    },
    /// The number of estimates does not match the configured scenario count.
    LengthMismatch {
        /// Configured number of scenarios.
        expected: usize,
        /// Number of estimates supplied.
        found: usize,
    },
    /// A win-rate estimate lies outside `[0, 1]` (or is NaN).
    OutOfRange {
        /// Scenario index of the offending estimate.
        index: usize,
        /// The offending value.
        value: f64,
    },
    /// A scenario index beyond the tracker's scenario count.
    UnknownScenario {
        /// The requested scenario index.
        index: usize,
        /// Number of scenarios the tracker was built for.
        scenario_count: usize,
    },
    /// The update rule's parameters are unusable.
    InvalidRule {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes (expected b\"SKWR\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported checkpoint version {found}")
            }
            Self::LengthMismatch { expected, found } => {
                write!(f, "expected {expected} win-rate estimates, found {found}")
            }
            Self::OutOfRange { index, value } => {
                write!(f, "win-rate estimate {value} for scenario {index} is outside [0, 1]")
            }
            Self::UnknownScenario {
                index,
                scenario_count,
            } => write!(
                f,
                "scenario {index} out of range (scenario_count={scenario_count})"
            ),
            Self::InvalidRule { reason } => write!(f, "invalid win-rate update rule: {reason}"),
        }
    }
}

impl std::error::Error for StatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StatsError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
