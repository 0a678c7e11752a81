//! Fixed-shape episode batch for parallel experience collection.
//!
//! An [`EpisodeBatch`] holds `B` parallel episode slots, each with a time
//! axis of `T_max = episode_limit + 1` steps. Every field registered in the
//! [`Scheme`] owns one dense, zero-initialised `Vec<f32>` indexed
//! `[slot, t, ...]`, allocated once and never resized.
//!
//! # Ragged episodes
//!
//! Episodes end at different timesteps. Instead of resizing, the batch
//! keeps a parallel `filled[slot, t]` mask:
//!
//! ```text
//!            t=0  t=1  t=2  t=3  t=4  t=5
//! slot 0      ■    ■    ■    □    □    □     episode_length = 2
//! slot 1      ■    ■    ■    ■    □    □     episode_length = 3
//! slot 2      ■    ■    ■    ■    ■    ■     episode_length = 5
//! ```
//!
//! Data in unfilled cells is unspecified; consumers must gate every read on
//! the mask.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod error;
pub mod scheme;

pub use batch::{EpisodeBatch, FieldView, SlotView};
pub use error::BatchError;
pub use scheme::{FieldGroup, FieldSpec, Scheme};
