//! IS-003: Read-only accessors over a loaded state document.
//!
//! Module lookups always fail with an actionable error. Named-entry lookups
//! take a [`Presence`] that decides whether an absent entry is an error or
//! `Ok(None)`.

use super::ports::{self, ApiPortResolver, DescriptionMatch};
use super::types::*;
use crate::error::StateError;
use serde_yaml_ng::{Mapping, Value};

/// How a named-entry lookup treats an absent entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Absent is a NotFound error
    Required,
    /// Absent is `Ok(None)`
    Optional,
}

impl Presence {
    fn resolve<T>(self, found: Option<T>, kind: &'static str, name: &str) -> Result<Option<T>, StateError> {
        match (found, self) {
            (Some(v), _) => Ok(Some(v)),
            (None, Presence::Optional) => Ok(None),
            (None, Presence::Required) => Err(StateError::NotFound {
                kind,
                name: name.to_string(),
            }),
        }
    }
}

/// Module names derived from `timescaledb_<module>` container keys.
pub fn available_modules(state: &InfrastructureState) -> Vec<String> {
    state
        .containers()
        .map(|c| {
            c.keys()
                .filter_map(Value::as_str)
                .filter_map(|k| k.strip_prefix(DB_CONTAINER_PREFIX))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn container_value<'a>(state: &'a InfrastructureState, name: &str) -> Option<&'a Value> {
    state.containers().and_then(|c| c.get(name))
}

/// Database connection settings for a module.
pub fn get_db_config(state: &InfrastructureState, module: &str) -> Result<DbConfig, StateError> {
    let key = format!("{}{}", DB_CONTAINER_PREFIX, module);
    let Some(raw) = container_value(state, &key) else {
        return Err(StateError::ModuleNotFound {
            module: module.to_string(),
            available: available_modules(state),
        });
    };
    let container: ContainerInfo = decode(raw, &format!("container {}", key))?;
    let creds = container.credentials.unwrap_or_default();

    let missing = creds.missing_fields();
    let (Some(user), Some(password), Some(database)) = (creds.user, creds.password, creds.database)
    else {
        return Err(StateError::MissingField {
            context: format!("credential keys for {}", module),
            fields: missing,
        });
    };
    let Some(port) = container.port else {
        return Err(StateError::MissingField {
            context: format!("container keys for {}", module),
            fields: vec!["port".to_string()],
        });
    };

    Ok(DbConfig {
        host: LOCAL_HOST.to_string(),
        port,
        user,
        password,
        database,
    })
}

/// Cache connection settings.
pub fn get_redis_config(state: &InfrastructureState) -> Result<RedisConfig, StateError> {
    let raw = container_value(state, REDIS_CONTAINER).ok_or(StateError::RedisNotConfigured)?;
    let container: ContainerInfo = decode(raw, "container redis")?;
    let port = container.port.ok_or_else(|| StateError::MissingField {
        context: "container keys for redis".to_string(),
        fields: vec!["port".to_string()],
    })?;
    Ok(RedisConfig {
        host: LOCAL_HOST.to_string(),
        port,
    })
}

/// API port of a module, resolved by description matching.
pub fn get_api_port(state: &InfrastructureState, module: &str) -> Result<u16, StateError> {
    get_api_port_with(&DescriptionMatch, state, module)
}

/// API port of a module, resolved by the given strategy.
pub fn get_api_port_with(
    resolver: &dyn ApiPortResolver,
    state: &InfrastructureState,
    module: &str,
) -> Result<u16, StateError> {
    resolver.api_port(state, module)
}

/// Known conflicts exactly as written, in document order. Empty when the
/// section is absent.
pub fn list_known_conflicts(state: &InfrastructureState) -> Result<Vec<Value>, StateError> {
    match state.get("known_conflicts") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(entries)) => Ok(entries.clone()),
        Some(other) => Err(StateError::Malformed {
            what: "known_conflicts".to_string(),
            message: format!("expected a sequence, got {}", value_kind(other)),
        }),
    }
}

/// The whole port registry, in document order.
pub fn all_ports(state: &InfrastructureState) -> Mapping {
    state.ports().cloned().unwrap_or_default()
}

/// Description registered for a port.
pub fn port_description(
    state: &InfrastructureState,
    port: u16,
    presence: Presence,
) -> Result<Option<String>, StateError> {
    let found = ports::registry_entries(state)
        .into_iter()
        .find(|(p, _)| *p == port)
        .map(|(_, desc)| desc.to_string());
    presence.resolve(found, "port", &port.to_string())
}

/// Raw container entry by full container name.
pub fn container(
    state: &InfrastructureState,
    name: &str,
    presence: Presence,
) -> Result<Option<Value>, StateError> {
    presence.resolve(container_value(state, name).cloned(), "container", name)
}

/// Credentials of a container by full container name. A container without
/// credentials counts as absent.
pub fn credentials(
    state: &InfrastructureState,
    name: &str,
    presence: Presence,
) -> Result<Option<Credentials>, StateError> {
    let found = match container_value(state, name) {
        Some(raw) => decode::<ContainerInfo>(raw, &format!("container {}", name))?.credentials,
        None => None,
    };
    presence.resolve(found, "credentials for container", name)
}

/// Raw service entry by repository name.
pub fn service_entry(
    state: &InfrastructureState,
    repo: &str,
    presence: Presence,
) -> Result<Option<Value>, StateError> {
    let found = state.services().and_then(|s| s.get(repo)).cloned();
    presence.resolve(found, "service", repo)
}

/// Last recorded run of a service.
pub fn service_status(
    state: &InfrastructureState,
    repo: &str,
    presence: Presence,
) -> Result<Option<ServiceStatus>, StateError> {
    let found = match state.services().and_then(|s| s.get(repo)) {
        Some(raw) => Some(decode(raw, &format!("service {}", repo))?),
        None => None,
    };
    presence.resolve(found, "service", repo)
}
