//! IS-006: Structural validation of the state document.
//!
//! Every check runs independently and all violations are collected:
//! - Required top-level keys present
//! - Version is `X.Y.Z` with numeric components
//! - `last_updated` is an ISO 8601 timestamp
//! - Every container has `port` and `status`
//! - Every port registry key is an integer
//!
//! Port numbers in `containers` and in the `ports` registry are authored
//! independently. A container port with no registry entry is reported as a
//! warning and never fails validation.

use super::types::*;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_yaml_ng::Value;
use std::sync::OnceLock;

/// Validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome of [`validate`]. Only `errors` decide validity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a loaded document.
pub fn validate(state: &InfrastructureState) -> ValidationReport {
    let mut errors = Vec::new();

    for key in REQUIRED_KEYS {
        if !state.contains_key(key) {
            errors.push(ValidationError::new(format!("Missing required key: {}", key)));
        }
    }

    if let Some(version) = state.get("version") {
        if !version.as_str().is_some_and(is_valid_version) {
            errors.push(ValidationError::new(format!(
                "Invalid version format: {} (expected X.Y.Z)",
                yaml_value_to_string(version)
            )));
        }
    }

    if let Some(ts) = state.get("last_updated") {
        if !ts.as_str().is_some_and(is_iso8601) {
            errors.push(ValidationError::new(format!(
                "Invalid last_updated format: {} (expected ISO 8601)",
                yaml_value_to_string(ts)
            )));
        }
    }

    match state.get("containers") {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(containers)) => {
            for (name, container) in containers {
                let name = yaml_value_to_string(name);
                let fields = container.as_mapping();
                for field in ["port", "status"] {
                    if !fields.is_some_and(|m| m.contains_key(field)) {
                        errors.push(ValidationError::new(format!(
                            "Container {} missing '{}' field",
                            name, field
                        )));
                    }
                }
            }
        }
        Some(other) => errors.push(ValidationError::new(format!(
            "containers must be a mapping, got {}",
            value_kind(other)
        ))),
    }

    match state.get("ports") {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(ports)) => {
            for key in ports.keys() {
                if !is_integer(key) {
                    errors.push(ValidationError::new(format!(
                        "Port key must be integer: {}",
                        yaml_value_to_string(key)
                    )));
                }
            }
        }
        Some(other) => errors.push(ValidationError::new(format!(
            "ports must be a mapping, got {}",
            value_kind(other)
        ))),
    }

    ValidationReport {
        errors,
        warnings: port_registry_warnings(state),
    }
}

/// `X.Y.Z` with three all-digit components.
pub fn is_valid_version(version: &str) -> bool {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    VERSION_RE
        .get_or_init(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").expect("static regex pattern is valid"))
        .is_match(version)
}

/// ISO 8601 timestamp: RFC 3339 (`Z` or offset), a naive date-time with `T`
/// or space separator, or a plain calendar date.
pub fn is_iso8601(ts: &str) -> bool {
    let ts = ts.trim();
    if DateTime::parse_from_rfc3339(ts).is_ok() {
        return true;
    }
    // Offsets without a colon (`+0000`)
    if DateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f%z").is_ok() {
        return true;
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if NaiveDateTime::parse_from_str(ts, fmt).is_ok() {
            return true;
        }
    }
    NaiveDate::parse_from_str(ts, "%Y-%m-%d").is_ok()
}

fn is_integer(key: &Value) -> bool {
    match key {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        _ => false,
    }
}

/// Containers whose port has no entry in the `ports` registry.
pub fn port_registry_warnings(state: &InfrastructureState) -> Vec<String> {
    let (Some(containers), Some(ports)) = (state.containers(), state.ports()) else {
        return Vec::new();
    };
    let registered: Vec<u16> = ports.keys().filter_map(port_from_value).collect();

    containers
        .iter()
        .filter_map(|(name, c)| {
            let port = c.get("port").and_then(port_from_value)?;
            (!registered.contains(&port)).then(|| {
                format!(
                    "Container {} uses port {} which is not listed in ports",
                    yaml_value_to_string(name),
                    port
                )
            })
        })
        .collect()
}
