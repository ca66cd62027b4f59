//! infra-state: accessors and validation for the shared infrastructure state file.
//!
//! One YAML document (`state.yaml`) records database containers, the port
//! registry, per-service run status and known conflicts. This crate loads it,
//! answers lookups, validates its structure and records service runs.

pub mod cli;
pub mod core;
pub mod error;
pub mod vcs;

pub use error::{ErrorKind, StateError, SyncError};
