//! Statistics for parallel experience collection.
//!
//! - [`EpisodeStats`] accumulates returns, lengths, and final-step info
//!   counters between log flushes.
//! - [`WinRateTracker`] keeps a smoothed win-rate estimate per scenario,
//!   persisting across collection batches.
//! - [`codec`] holds the little-endian primitives used to checkpoint the
//!   tracker (no serde dependency).
//!
//! # Checkpoint format
//!
//! ```text
//! [MAGIC "SKWR"] [VERSION u8] [COUNT u32] [ESTIMATE f64] * COUNT
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod episode;
pub mod error;
pub mod win_rate;

pub use episode::{EpisodeStats, EpisodeSummary};
pub use error::StatsError;
pub use win_rate::{UpdateRule, WinRateSchedule, WinRateTracker};

/// Magic bytes at the start of every win-rate checkpoint.
pub const MAGIC: [u8; 4] = *b"SKWR";

/// Current checkpoint format version.
pub const FORMAT_VERSION: u8 = 1;
