//! IS-001: Types for the shared infrastructure state document.
//!
//! The document is kept as an insertion-ordered YAML mapping so a rewrite
//! reproduces unknown keys and key order exactly. Sections are decoded into
//! typed views on demand.

use crate::error::StateError;
use indexmap::IndexMap;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml_ng::{Mapping, Value};

/// Prefix of per-module database container keys (`timescaledb_<module>`).
pub const DB_CONTAINER_PREFIX: &str = "timescaledb_";

/// Container key of the cache service.
pub const REDIS_CONTAINER: &str = "redis";

/// Host reported for every container. Containers are always published on the
/// local machine, so the host is never read from the document.
pub const LOCAL_HOST: &str = "localhost";

/// Top-level keys every state document must carry.
pub const REQUIRED_KEYS: [&str; 5] = ["version", "last_updated", "containers", "ports", "services"];

// ============================================================================
// Document handle
// ============================================================================

/// Handle over a loaded `state.yaml`. Callers re-load to observe writes made
/// by other processes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfrastructureState {
    root: Mapping,
}

impl InfrastructureState {
    pub fn from_mapping(root: Mapping) -> Self {
        Self { root }
    }

    /// Build a handle from a parsed YAML value. An empty document (null) is an
    /// empty mapping; any other non-mapping root is rejected.
    pub fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Mapping(root) => Ok(Self { root }),
            Value::Null => Ok(Self::default()),
            other => Err(format!(
                "document root must be a mapping, got {}",
                value_kind(&other)
            )),
        }
    }

    pub fn root(&self) -> &Mapping {
        &self.root
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.root.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn version(&self) -> Option<&str> {
        self.get("version").and_then(Value::as_str)
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.get("last_updated").and_then(Value::as_str)
    }

    pub fn updated_by(&self) -> Option<&str> {
        self.get("updated_by").and_then(Value::as_str)
    }

    /// Raw `containers` section, if present and a mapping.
    pub fn containers(&self) -> Option<&Mapping> {
        self.get("containers").and_then(Value::as_mapping)
    }

    /// Raw `ports` section, if present and a mapping.
    pub fn ports(&self) -> Option<&Mapping> {
        self.get("ports").and_then(Value::as_mapping)
    }

    /// Raw `services` section, if present and a mapping.
    pub fn services(&self) -> Option<&Mapping> {
        self.get("services").and_then(Value::as_mapping)
    }

    /// Set a top-level string field, keeping its position if it already exists.
    pub fn set_str(&mut self, key: &str, value: &str) {
        self.root
            .insert(Value::String(key.to_string()), Value::String(value.to_string()));
    }

    /// Mutable `services` mapping, created (appended) when absent or not a mapping.
    pub fn services_mut(&mut self) -> &mut Mapping {
        if !self.root.get("services").is_some_and(Value::is_mapping) {
            self.root.insert(
                Value::String("services".to_string()),
                Value::Mapping(Mapping::new()),
            );
        }
        match self.root.get_mut("services") {
            Some(Value::Mapping(m)) => m,
            _ => unreachable!("services was just set to a mapping"),
        }
    }
}

/// Decode a YAML value into a typed view.
pub fn decode<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T, StateError> {
    serde_yaml_ng::from_value(value.clone()).map_err(|e| StateError::Malformed {
        what: what.to_string(),
        message: e.to_string(),
    })
}

// ============================================================================
// Containers
// ============================================================================

/// A container entry (`containers.<name>`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    #[serde(default, deserialize_with = "de_opt_port", skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, deserialize_with = "de_opt_scalar", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

/// Container credentials. Every field is optional in the document; the
/// accessors decide which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, deserialize_with = "de_opt_scalar", skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, deserialize_with = "de_opt_scalar", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, deserialize_with = "de_opt_scalar", skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Credentials {
    /// Names of the credential fields that are absent, in declaration order.
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("user", &self.user),
            ("password", &self.password),
            ("database", &self.database),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| k.to_string())
        .collect()
    }
}

// ============================================================================
// Services
// ============================================================================

/// Last known run of a downstream repository (`services.<repo>`).
///
/// Entries may be hand-written: absent string fields decode as empty, issue
/// ids may be numbers, and unrecognized keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(default, deserialize_with = "de_scalar")]
    pub last_run: String,

    #[serde(default, deserialize_with = "de_scalar")]
    pub last_commit: String,

    #[serde(default, deserialize_with = "de_scalar")]
    pub status: String,

    #[serde(default, deserialize_with = "de_scalar_list")]
    pub issues_completed: Vec<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

// ============================================================================
// Projections
// ============================================================================

/// Connection settings for a module database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Connection settings for the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
}

/// A mismatched environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub key: String,
    pub observed: String,
    pub expected: String,
}

/// Result of comparing local environment variables to the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvReport {
    pub valid: bool,
    pub discrepancies: Vec<Discrepancy>,
    pub missing: Vec<String>,
}

// ============================================================================
// Scalar helpers
// ============================================================================

/// Convert a scalar YAML value to its string form.
pub fn yaml_value_to_string(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Tagged(t) => yaml_value_to_string(&t.value),
        other => format!("{:?}", other),
    }
}

/// Interpret a YAML value as a port number (integer or numeric string).
pub fn port_from_value(val: &Value) -> Option<u16> {
    match val {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Short name of a value's YAML kind, for error messages.
pub fn value_kind(val: &Value) -> &'static str {
    match val {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn is_scalar(val: &Value) -> bool {
    matches!(val, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn de_scalar<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let val = Value::deserialize(d)?;
    if is_scalar(&val) || val.is_null() {
        Ok(yaml_value_to_string(&val))
    } else {
        Err(D::Error::custom(format!("expected a scalar, got {}", value_kind(&val))))
    }
}

fn de_opt_scalar<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(val) if is_scalar(&val) => Ok(Some(yaml_value_to_string(&val))),
        Some(val) => Err(D::Error::custom(format!(
            "expected a scalar, got {}",
            value_kind(&val)
        ))),
    }
}

fn de_scalar_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                if is_scalar(item) {
                    Ok(yaml_value_to_string(item))
                } else {
                    Err(D::Error::custom(format!(
                        "expected a scalar list item, got {}",
                        value_kind(item)
                    )))
                }
            })
            .collect(),
        Some(other) => Err(D::Error::custom(format!(
            "expected a sequence, got {}",
            value_kind(&other)
        ))),
    }
}

fn de_opt_port<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u16>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(val) => port_from_value(&val)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid port: {}", yaml_value_to_string(&val)))),
    }
}

// ============================================================================
// Tests
// ============================================================================
