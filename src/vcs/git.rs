//! IS-009: `git` command-line backend.
//!
//! Runs `git add`, `git commit` and `git push` in the repository that owns the
//! state file. No timeout is applied; a hung push blocks the caller.

use super::{ExecOutput, VersionControl};
use crate::error::SyncError;
use std::path::Path;
use std::process::{Command, Stdio};

/// Publishes through the `git` binary found on `PATH`.
#[derive(Debug, Clone)]
pub struct GitCli {
    pub remote: String,
    pub branch: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "main".to_string(),
        }
    }
}

impl GitCli {
    pub fn new(remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            branch: branch.into(),
        }
    }
}

/// Run `git <args>` in `repo_dir`, capturing output.
pub fn exec_git(repo_dir: &Path, args: &[&str]) -> Result<ExecOutput, SyncError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| SyncError::Spawn {
            program: "git".to_string(),
            source,
        })?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run a git step and turn a non-zero exit into an error.
fn run_step(repo_dir: &Path, args: &[&str]) -> Result<ExecOutput, SyncError> {
    let out = exec_git(repo_dir, args)?;
    tracing::debug!(step = %args.join(" "), exit_code = out.exit_code, "git step finished");
    if out.success() {
        Ok(out)
    } else {
        Err(SyncError::StepFailed {
            step: format!("git {}", args.join(" ")),
            exit_code: out.exit_code,
            stderr: out.stderr.trim().to_string(),
        })
    }
}

impl VersionControl for GitCli {
    fn publish(&self, repo_dir: &Path, file: &Path, message: &str) -> Result<(), SyncError> {
        let file = file.to_string_lossy();
        run_step(repo_dir, &["add", &file])?;
        run_step(repo_dir, &["commit", "-m", message])?;
        run_step(repo_dir, &["push", &self.remote, &self.branch])?;
        Ok(())
    }
}
