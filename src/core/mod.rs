//! Core state logic: document types, loading, lookups, validation, updates.

pub mod env;
pub mod ports;
pub mod query;
pub mod state;
pub mod types;
pub mod update;
pub mod validator;
