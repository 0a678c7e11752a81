//! Error types for the environment and policy collaborators.
//!
//! Subsystem errors (batch, worker, runner, statistics) live in their own
//! crates and wrap these where a collaborator failure propagates upward.

use std::error::Error;
use std::fmt;

/// Errors raised by an [`Environment`](crate::Environment) implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvError {
    /// The environment could not be constructed by its factory.
    Construction {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The game engine failed while executing a command.
    Simulation {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The action vector does not match the number of agents.
    InvalidActions {
        /// Number of agents the environment controls.
        expected: usize,
        /// Number of actions received.
        got: usize,
    },
    /// `step` was called on an episode that has already terminated.
    EpisodeOver,
    /// The environment has been closed.
    Closed,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction { reason } => write!(f, "environment construction failed: {reason}"),
            Self::Simulation { reason } => write!(f, "simulation failed: {reason}"),
            Self::InvalidActions { expected, got } => {
                write!(f, "expected {expected} actions, got {got}")
            }
            Self::EpisodeOver => write!(f, "step called after episode termination"),
            Self::Closed => write!(f, "environment is closed"),
        }
    }
}

impl Error for EnvError {}

/// Errors raised by a policy controller during action selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyError {
    /// A batch field the policy needs is not registered in the scheme.
    MissingInput {
        /// Name of the missing field.
        field: String,
    },
    /// Action selection failed inside the policy.
    SelectionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInput { field } => write!(f, "policy input field '{field}' missing"),
            Self::SelectionFailed { reason } => write!(f, "action selection failed: {reason}"),
        }
    }
}

impl Error for PolicyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_counts() {
        let e = EnvError::InvalidActions {
            expected: 5,
            got: 3,
        };
        assert_eq!(e.to_string(), "expected 5 actions, got 3");
    }

    #[test]
    fn policy_error_names_field() {
        let e = PolicyError::MissingInput {
            field: "avail_actions".into(),
        };
        assert!(e.to_string().contains("avail_actions"));
    }
}
