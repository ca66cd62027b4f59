//! IS-007: Error taxonomy for state file access.
//!
//! Lookups fail with a [`StateError`]; validation never fails and returns a
//! report instead. Version-control failures are a separate [`SyncError`] because
//! they never unwind a completed local write.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`StateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Parse,
    MissingField,
    Io,
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("state file not found at {0}. Make sure the infrastructure state repository is cloned.")]
    StateFileNotFound(PathBuf),

    #[error("Module '{module}' not found in state file. Available modules: {}", .available.join(", "))]
    ModuleNotFound {
        module: String,
        available: Vec<String>,
    },

    #[error("Redis not configured in state file")]
    RedisNotConfigured,

    #[error("API port for module '{0}' not found in state file ports")]
    ApiPortNotFound(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("malformed {what}: {message}")]
    Malformed { what: String, message: String },

    #[error("Missing required {context}: {}", .fields.join(", "))]
    MissingField {
        context: String,
        fields: Vec<String>,
    },

    #[error("cannot {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize error: {0}")]
    Serialize(String),
}

impl StateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StateFileNotFound(_)
            | Self::ModuleNotFound { .. }
            | Self::RedisNotConfigured
            | Self::ApiPortNotFound(_)
            | Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Parse { .. } | Self::Malformed { .. } => ErrorKind::Parse,
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::Io { .. } | Self::Serialize(_) => ErrorKind::Io,
        }
    }
}

/// Failure of the remote synchronization phase.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{step}` exited with code {exit_code}: {stderr}")]
    StepFailed {
        step: String,
        exit_code: i32,
        stderr: String,
    },
}
