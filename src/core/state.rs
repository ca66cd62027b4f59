//! IS-002: State file loading and atomic saving.

use super::types::InfrastructureState;
use crate::error::StateError;
use std::path::{Path, PathBuf};

/// File name of the shared state document.
pub const STATE_FILE_NAME: &str = "state.yaml";

/// Derive the state file path inside a checkout of the state repository.
pub fn state_file_path(repo_dir: &Path) -> PathBuf {
    repo_dir.join(STATE_FILE_NAME)
}

/// Directory that owns the state file (the repository working tree).
pub fn repo_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load the state document. Every call re-reads the file.
pub fn load(path: &Path) -> Result<InfrastructureState, StateError> {
    if !path.exists() {
        return Err(StateError::StateFileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| StateError::Io {
        action: "read",
        path: path.to_path_buf(),
        source,
    })?;
    let state = parse(&content).map_err(|message| StateError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    tracing::debug!(path = %path.display(), keys = state.root().len(), "loaded state file");
    Ok(state)
}

/// Parse a state document from a string.
pub fn parse(yaml: &str) -> Result<InfrastructureState, String> {
    let value: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))?;
    InfrastructureState::from_value(value)
}

/// Serialize the whole document. Key order is kept as loaded.
pub fn to_yaml(state: &InfrastructureState) -> Result<String, StateError> {
    serde_yaml_ng::to_string(state.root()).map_err(|e| StateError::Serialize(e.to_string()))
}

/// Replace the state file with the full document (write to temp, then rename).
///
/// There is no lock: a concurrent writer that loaded an older copy will
/// overwrite this one when it saves.
pub fn save(path: &Path, state: &InfrastructureState) -> Result<(), StateError> {
    let yaml = to_yaml(state)?;

    let tmp_path = path.with_extension("yaml.tmp");
    std::fs::write(&tmp_path, &yaml).map_err(|source| StateError::Io {
        action: "write",
        path: tmp_path.clone(),
        source,
    })?;
    if let Err(source) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StateError::Io {
            action: "replace",
            path: path.to_path_buf(),
            source,
        });
    }

    tracing::debug!(path = %path.display(), bytes = yaml.len(), "saved state file");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_yaml_ng::Value;

    #[test]
    fn test_is002_state_file_path() {
        let p = state_file_path(Path::new("/repo"));
        assert_eq!(p, PathBuf::from("/repo/state.yaml"));
    }

    #[test]
    fn test_is002_repo_dir_of() {
        assert_eq!(repo_dir_of(Path::new("/repo/state.yaml")), PathBuf::from("/repo"));
        assert_eq!(repo_dir_of(Path::new("state.yaml")), PathBuf::from("."));
    }

    #[test]
    fn test_is002_load_sample() {
        let (_dir, path) = fixtures::sample_file();
        let state = load(&path).unwrap();
        assert_eq!(state.version(), Some("1.4.2"));
        assert_eq!(state.containers().unwrap().len(), 3);
    }

    #[test]
    fn test_is002_load_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("state.yaml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("state.yaml"));
    }

    #[test]
    fn test_is002_load_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_file_path(dir.path());
        std::fs::write(&path, "not: [valid: yaml: {{").unwrap();
        let err = load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_is002_load_scalar_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_file_path(dir.path());
        std::fs::write(&path, "just a string\n").unwrap();
        let err = load(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_is002_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_file_path(dir.path());
        std::fs::write(&path, "").unwrap();
        let state = load(&path).unwrap();
        assert!(state.root().is_empty());
    }

    #[test]
    fn test_is002_load_rereads_file() {
        let (_dir, path) = fixtures::sample_file();
        let first = load(&path).unwrap();
        std::fs::write(&path, "version: \"9.9.9\"\n").unwrap();
        let second = load(&path).unwrap();
        assert_eq!(first.version(), Some("1.4.2"));
        assert_eq!(second.version(), Some("9.9.9"));
    }

    #[test]
    fn test_is002_atomic_write() {
        let (dir, path) = fixtures::sample_file();
        let state = load(&path).unwrap();
        save(&path, &state).unwrap();

        assert!(!dir.path().join("state.yaml.tmp").exists());
        assert!(path.exists());
    }

    #[test]
    fn test_is002_failed_replace_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = state_file_path(dir.path());
        // A non-empty directory at the target path makes the rename fail.
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let err = save(&path, &fixtures::sample()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!dir.path().join("state.yaml.tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_is002_roundtrip_preserves_order_and_unknown_keys() {
        let yaml = "zeta: 1\nversion: \"1.0.0\"\nalpha:\n  nested: true\nports:\n  9000: b\n  8000: a\n";
        let state = parse(yaml).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = state_file_path(dir.path());
        save(&path, &state).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, state);
        let keys: Vec<_> = loaded.root().keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["zeta", "version", "alpha", "ports"]);
        let ports: Vec<_> = loaded.ports().unwrap().keys().filter_map(Value::as_u64).collect();
        assert_eq!(ports, vec![9000, 8000]);
    }
}
