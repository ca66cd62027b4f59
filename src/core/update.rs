//! IS-008: Record a service run in the state file and publish it.
//!
//! Two phases with separate outcomes:
//! load → mutate → save (local, durable) → publish (remote, best effort)
//!
//! A failed publish leaves the local write in place. Nothing serializes
//! concurrent writers: two updates racing on the same file keep only the one
//! saved last.

use super::state;
use super::types::{InfrastructureState, ServiceStatus};
use crate::error::StateError;
use crate::vcs::VersionControl;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_yaml_ng::Value;
use std::path::{Path, PathBuf};

/// Status stamped on every recorded run.
pub const OPERATIONAL: &str = "operational";

/// Outcome of the remote synchronization phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Staged, committed and pushed
    Pushed,
    /// Synchronization was not requested
    Skipped,
    /// Publishing failed; the local file is already written
    Failed(String),
}

/// Result of [`update_service`].
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub record: ServiceStatus,
    pub path: PathBuf,
    pub sync: SyncOutcome,
}

/// Format a UTC instant as ISO 8601 with microseconds and a `Z` suffix.
pub fn iso8601_utc(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current UTC time as ISO 8601.
pub fn now_iso8601() -> String {
    iso8601_utc(Utc::now())
}

/// Commit message used when publishing an update.
pub fn commit_message(repo: &str, commit: &str) -> String {
    format!("Update state: {} @ {}", repo, commit)
}

/// Replace `services[repo]` with a fresh record and stamp the document.
/// Other service entries are left untouched.
pub fn apply_service_update(
    state: &mut InfrastructureState,
    repo: &str,
    commit: &str,
    issues: Vec<String>,
    at: &str,
) -> Result<ServiceStatus, StateError> {
    let record = ServiceStatus {
        last_run: at.to_string(),
        last_commit: commit.to_string(),
        status: OPERATIONAL.to_string(),
        issues_completed: issues,
        extra: Default::default(),
    };
    let value =
        serde_yaml_ng::to_value(&record).map_err(|e| StateError::Serialize(e.to_string()))?;

    state
        .services_mut()
        .insert(Value::String(repo.to_string()), value);
    state.set_str("last_updated", at);
    state.set_str("updated_by", repo);
    Ok(record)
}

/// Load, record the run, save, then publish through `vcs` (when given).
pub fn update_service(
    path: &Path,
    repo: &str,
    commit: &str,
    issues: Option<Vec<String>>,
    vcs: Option<&dyn VersionControl>,
) -> Result<UpdateOutcome, StateError> {
    let mut doc = state::load(path)?;
    let record = apply_service_update(&mut doc, repo, commit, issues.unwrap_or_default(), &now_iso8601())?;
    state::save(path, &doc)?;
    tracing::info!(repo, commit, path = %path.display(), "recorded service run");

    let sync = match vcs {
        None => SyncOutcome::Skipped,
        Some(vcs) => {
            let repo_dir = state::repo_dir_of(path);
            let file = path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(state::STATE_FILE_NAME));
            match vcs.publish(&repo_dir, &file, &commit_message(repo, commit)) {
                Ok(()) => SyncOutcome::Pushed,
                Err(e) => {
                    tracing::debug!(error = %e, "sync failed after local write");
                    SyncOutcome::Failed(e.to_string())
                }
            }
        }
    };

    Ok(UpdateOutcome {
        record,
        path: path.to_path_buf(),
        sync,
    })
}

/// Split a comma-separated issue list, dropping empty items.
pub fn parse_issue_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
