//! IS-010: CLI subcommands: query, update, validate, env, completions.

use crate::core::query::{self, Presence};
use crate::core::types::InfrastructureState;
use crate::core::{env, state, update, validator};
use crate::error::StateError;
use crate::vcs::{GitCli, VersionControl};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "infra-state",
    version,
    about = "Query, validate and update the shared infrastructure state file"
)]
pub struct Cli {
    /// Path to state.yaml
    #[arg(
        short,
        long,
        global = true,
        env = "INFRA_STATE_FILE",
        default_value = state::STATE_FILE_NAME
    )]
    pub file: PathBuf,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a value from the state file as JSON
    Query {
        #[command(subcommand)]
        target: QueryTarget,
    },

    /// Record a service run and publish the state file
    Update {
        /// Repository / service name
        repo: String,

        /// Commit that was run
        commit: String,

        /// Comma-separated issue ids completed by the run
        issues: Option<String>,

        /// Write locally only; skip git add/commit/push
        #[arg(long)]
        no_sync: bool,

        /// Remote to push to
        #[arg(long, default_value = "origin")]
        remote: String,

        /// Branch to push
        #[arg(long, default_value = "main")]
        branch: String,
    },

    /// Validate the state file structure
    Validate,

    /// Compare DB_* environment variables against a module's database
    Env {
        /// Module name (e.g. quotes, capacity)
        module: String,
    },

    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueryTarget {
    /// Raw container entry
    Db {
        #[arg(default_value = "timescaledb_quotes")]
        container: String,
    },

    /// Connection settings for a module database
    DbConfig { module: String },

    /// Connection settings for the cache
    Redis,

    /// API port of a module
    ApiPort { module: String },

    /// Full port registry
    Ports,

    /// Description of one port
    Port { port: u16 },

    /// Credentials of a container
    Credentials { container: String },

    /// Last recorded run of a service
    Service { repo: String },

    /// Known conflicts
    Conflicts,
}

/// Dispatch a CLI command against the state file at `file`.
pub fn dispatch(cmd: Commands, file: &Path) -> Result<(), String> {
    match cmd {
        Commands::Query { target } => cmd_query(file, target),
        Commands::Update {
            repo,
            commit,
            issues,
            no_sync,
            remote,
            branch,
        } => {
            let git = GitCli::new(remote, branch);
            let vcs: Option<&dyn VersionControl> = if no_sync { None } else { Some(&git) };
            cmd_update(file, &repo, &commit, issues.as_deref(), vcs)
        }
        Commands::Validate => cmd_validate(file),
        Commands::Env { module } => cmd_env(file, &module, &env::process_env()),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialize error: {}", e))?;
    println!("{}", json);
    Ok(())
}

/// Evaluate a query to the JSON value it prints.
fn query_value(doc: &InfrastructureState, target: &QueryTarget) -> Result<serde_json::Value, String> {
    fn json<T: Serialize>(result: Result<T, StateError>) -> Result<serde_json::Value, String> {
        let value = result.map_err(|e| e.to_string())?;
        serde_json::to_value(value).map_err(|e| format!("JSON serialize error: {}", e))
    }

    match target {
        QueryTarget::Db { container } => json(query::container(doc, container, Presence::Required)),
        QueryTarget::DbConfig { module } => json(query::get_db_config(doc, module)),
        QueryTarget::Redis => json(query::get_redis_config(doc)),
        QueryTarget::ApiPort { module } => json(query::get_api_port(doc, module)),
        QueryTarget::Ports => json(Ok(query::all_ports(doc))),
        QueryTarget::Port { port } => json(
            query::port_description(doc, *port, Presence::Required)
                .map(|desc| BTreeMap::from([(port.to_string(), desc)])),
        ),
        QueryTarget::Credentials { container } => {
            json(query::credentials(doc, container, Presence::Required))
        }
        QueryTarget::Service { repo } => json(query::service_entry(doc, repo, Presence::Required)),
        QueryTarget::Conflicts => json(query::list_known_conflicts(doc)),
    }
}

fn cmd_query(file: &Path, target: QueryTarget) -> Result<(), String> {
    let doc = state::load(file).map_err(|e| e.to_string())?;
    let value = query_value(&doc, &target)?;
    print_json(&value)
}

fn cmd_update(
    file: &Path,
    repo: &str,
    commit: &str,
    issues: Option<&str>,
    vcs: Option<&dyn VersionControl>,
) -> Result<(), String> {
    let issues = issues.map(update::parse_issue_list);
    let outcome = update::update_service(file, repo, commit, issues, vcs).map_err(|e| e.to_string())?;

    println!("Updated state for {} @ {}", repo, commit);
    match outcome.sync {
        update::SyncOutcome::Pushed => println!("State pushed to remote"),
        update::SyncOutcome::Skipped => println!("State updated locally (sync skipped)"),
        update::SyncOutcome::Failed(reason) => {
            eprintln!("Warning: git operations failed: {}", reason);
            eprintln!("State updated locally but not pushed");
        }
    }
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let doc = state::load(file).map_err(|e| e.to_string())?;
    let report = validator::validate(&doc);

    for w in &report.warnings {
        eprintln!("  WARNING: {}", w);
    }

    if report.is_valid() {
        println!("{} validation passed ✓", display_name(file));
        Ok(())
    } else {
        println!("Validation failed:");
        for e in &report.errors {
            println!("  - {}", e);
        }
        Err(format!("{} validation error(s)", report.errors.len()))
    }
}

fn cmd_env(
    file: &Path,
    module: &str,
    vars: &indexmap::IndexMap<String, String>,
) -> Result<(), String> {
    let doc = state::load(file).map_err(|e| e.to_string())?;
    let report = env::validate_local_env(&doc, module, vars).map_err(|e| e.to_string())?;
    print_json(&report)?;
    if report.valid {
        Ok(())
    } else {
        Err(format!(
            "environment does not match {}: {} mismatched, {} missing",
            module,
            report.discrepancies.len(),
            report.missing.len()
        ))
    }
}

fn cmd_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "infra-state", &mut std::io::stdout());
}

fn display_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::fixtures;
    use crate::vcs::testing::RecordingVcs;

    #[test]
    fn test_is010_query_db_raw() {
        let doc = fixtures::sample();
        let v = query_value(&doc, &QueryTarget::Db { container: "timescaledb_quotes".into() }).unwrap();
        assert_eq!(v["port"], 5433);
        assert_eq!(v["credentials"]["database"], "opa_quotes");
    }

    #[test]
    fn test_is010_query_db_config() {
        let doc = fixtures::sample();
        let v = query_value(&doc, &QueryTarget::DbConfig { module: "capacity".into() }).unwrap();
        assert_eq!(v["host"], "localhost");
        assert_eq!(v["port"], 5434);
    }

    #[test]
    fn test_is010_query_ports_stringifies_keys() {
        let doc = fixtures::sample();
        let v = query_value(&doc, &QueryTarget::Ports).unwrap();
        assert_eq!(v["6381"], "Redis cache");
    }

    #[test]
    fn test_is010_query_port() {
        let doc = fixtures::sample();
        let v = query_value(&doc, &QueryTarget::Port { port: 8000 }).unwrap();
        assert_eq!(v["8000"], "opa-quotes-api (FastAPI)");
        assert!(query_value(&doc, &QueryTarget::Port { port: 1 }).is_err());
    }

    #[test]
    fn test_is010_query_not_found() {
        let doc = fixtures::sample();
        let err = query_value(&doc, &QueryTarget::Service { repo: "ghost".into() }).unwrap_err();
        assert_eq!(err, "service 'ghost' not found");
        assert!(query_value(&doc, &QueryTarget::Credentials { container: "ghost".into() }).is_err());
        assert!(query_value(&doc, &QueryTarget::Db { container: "ghost".into() }).is_err());
    }

    #[test]
    fn test_is010_query_service_prints_raw_entry() {
        let doc = state::parse(
            "services:\n  svc:\n    last_commit: abc\n    issues_completed: [291]\n    note: manual\n",
        )
        .unwrap();
        let v = query_value(&doc, &QueryTarget::Service { repo: "svc".into() }).unwrap();
        assert_eq!(v["issues_completed"][0], 291);
        assert_eq!(v["note"], "manual");
        assert!(v.get("last_run").is_none());
    }

    #[test]
    fn test_is010_query_conflicts_verbatim() {
        let doc = state::parse("known_conflicts:\n- id: C-1\n  description: {a: 1}\n").unwrap();
        let v = query_value(&doc, &QueryTarget::Conflicts).unwrap();
        assert_eq!(v, serde_json::json!([{"id": "C-1", "description": {"a": 1}}]));
    }

    #[test]
    fn test_is010_query_conflicts_and_redis() {
        let doc = fixtures::sample();
        let v = query_value(&doc, &QueryTarget::Conflicts).unwrap();
        assert_eq!(v[0]["severity"], "high");
        let v = query_value(&doc, &QueryTarget::Redis).unwrap();
        assert_eq!(v["port"], 6381);
        let v = query_value(&doc, &QueryTarget::ApiPort { module: "capacity".into() }).unwrap();
        assert_eq!(v, 8001);
    }

    #[test]
    fn test_is010_query_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = cmd_query(&dir.path().join("state.yaml"), QueryTarget::Conflicts);
        assert!(result.unwrap_err().contains("not found"));
    }

    #[test]
    fn test_is010_validate_valid() {
        let (_dir, path) = fixtures::sample_file();
        cmd_validate(&path).unwrap();
    }

    #[test]
    fn test_is010_validate_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = state::state_file_path(dir.path());
        std::fs::write(&path, "version: \"1.2\"\n").unwrap();
        let err = cmd_validate(&path).unwrap_err();
        assert_eq!(err, "5 validation error(s)");
    }

    #[test]
    fn test_is010_update_with_failed_sync_succeeds() {
        let (_dir, path) = fixtures::sample_file();
        let vcs = RecordingVcs {
            fail_with: Some("no remote".to_string()),
            ..Default::default()
        };
        cmd_update(&path, "svc", "c1", Some("A-1,A-2"), Some(&vcs)).unwrap();
        let doc = state::load(&path).unwrap();
        let svc = query::service_status(&doc, "svc", Presence::Required).unwrap().unwrap();
        assert_eq!(svc.issues_completed, vec!["A-1", "A-2"]);
    }

    #[test]
    fn test_is010_update_no_sync() {
        let (_dir, path) = fixtures::sample_file();
        cmd_update(&path, "svc", "c1", None, None).unwrap();
    }

    #[test]
    fn test_is010_env_mismatch_fails() {
        let (_dir, path) = fixtures::sample_file();
        let vars = indexmap::IndexMap::from([("DB_PORT".to_string(), "5433".to_string())]);
        let err = cmd_env(&path, "capacity", &vars).unwrap_err();
        assert!(err.contains("1 mismatched, 3 missing"));
    }

    #[test]
    fn test_is010_env_match_passes() {
        let (_dir, path) = fixtures::sample_file();
        let vars = indexmap::IndexMap::from([
            ("DB_PORT".to_string(), "5433".to_string()),
            ("DB_USER".to_string(), "opa_user".to_string()),
            ("DB_PASSWORD".to_string(), "opa_pass".to_string()),
            ("DB_NAME".to_string(), "opa_quotes".to_string()),
        ]);
        cmd_env(&path, "quotes", &vars).unwrap();
    }

    #[test]
    fn test_is010_display_name() {
        assert_eq!(display_name(Path::new("/repo/state.yaml")), "state.yaml");
    }
}
