//! IS-009: Version-control integration: publish the state file to the remote.

pub mod git;

use crate::error::SyncError;
use std::path::Path;

pub use git::GitCli;

/// Output from running an external command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Stages, commits and pushes a file.
pub trait VersionControl {
    /// Publish `file` (relative to `repo_dir`) with the given commit message.
    fn publish(&self, repo_dir: &Path, file: &Path, message: &str) -> Result<(), SyncError>;
}
