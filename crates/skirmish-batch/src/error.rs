//! Batch-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur while building a scheme or filling a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchError {
    /// A field name that is not registered in the scheme.
    UnknownField {
        /// The unrecognised field.
        field: String,
    },
    /// A field name registered twice.
    DuplicateField {
        /// The duplicated field.
        field: String,
    },
    /// A field registered with a zero per-step length.
    EmptyField {
        /// The offending field.
        field: String,
    },
    /// A pre-transition field the scheme requires was absent from a worker's
    /// observation bundle.
    MissingField {
        /// The missing field.
        field: String,
        /// Slot whose bundle was incomplete.
        slot: usize,
    },
    /// The number of values written does not match the field's length.
    ShapeMismatch {
        /// The field being written.
        field: String,
        /// Per-step length registered in the scheme.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },
    /// Slot index beyond the batch size.
    SlotOutOfRange {
        /// Requested slot.
        slot: usize,
        /// Number of slots in the batch.
        batch_size: usize,
    },
    /// Timestep beyond the batch's time axis.
    TimestepOutOfRange {
        /// Requested timestep.
        t: usize,
        /// Length of the time axis (`episode_limit + 1`).
        max_seq_length: usize,
    },
    /// Batch dimensions are unusable (zero slots or zero timesteps).
    InvalidDimensions {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField { field } => write!(f, "unknown field '{field}'"),
            Self::DuplicateField { field } => write!(f, "field '{field}' registered twice"),
            Self::EmptyField { field } => write!(f, "field '{field}' has zero length"),
            Self::MissingField { field, slot } => {
                write!(f, "slot {slot}: observation is missing field '{field}'")
            }
            Self::ShapeMismatch {
                field,
                expected,
                got,
            } => write!(
                f,
                "field '{field}': expected {expected} values per step, got {got}"
            ),
            Self::SlotOutOfRange { slot, batch_size } => {
                write!(f, "slot {slot} out of range (batch_size={batch_size})")
            }
            Self::TimestepOutOfRange { t, max_seq_length } => {
                write!(f, "timestep {t} out of range (max_seq_length={max_seq_length})")
            }
            Self::InvalidDimensions { reason } => write!(f, "invalid batch dimensions: {reason}"),
        }
    }
}

impl Error for BatchError {}
