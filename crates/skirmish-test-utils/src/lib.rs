//! Test utilities for Skirmish development.
//!
//! Provides scripted and random implementations of
//! [`Environment`](skirmish_core::Environment) and
//! [`PolicyController`](skirmish_runner::PolicyController), a shared
//! [`CallLog`] for asserting on the worker protocol, and standard
//! [`EnvInfo`](skirmish_core::EnvInfo) fixtures.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod env;
pub mod fixtures;
pub mod policy;

pub use env::{Call, CallLog, RandomEnv, Script, ScriptedEnv};
pub use fixtures::{entity_info, flat_info};
pub use policy::{FirstAvailablePolicy, RandomPolicy};
