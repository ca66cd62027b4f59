//! IS-004: Module API port resolution.
//!
//! The port registry maps port numbers to free-text descriptions. Resolving a
//! module's API port goes through [`ApiPortResolver`] so the description
//! matching rule can be swapped for an explicit table without touching callers.

use super::types::{port_from_value, InfrastructureState};
use crate::error::StateError;
use indexmap::IndexMap;
use serde_yaml_ng::Value;

/// Strategy for finding the API port of a module.
pub trait ApiPortResolver {
    fn api_port(&self, state: &InfrastructureState, module: &str) -> Result<u16, StateError>;
}

/// Port registry entries in document order, with keys coerced to port numbers.
/// Keys that are not port numbers and descriptions that are not strings are
/// skipped.
pub fn registry_entries(state: &InfrastructureState) -> Vec<(u16, &str)> {
    let Some(ports) = state.ports() else {
        return Vec::new();
    };
    ports
        .iter()
        .filter_map(|(k, v)| Some((port_from_value(k)?, v.as_str()?)))
        .collect()
}

/// Finds the first registry entry whose description contains
/// `<module>-api`, ignoring case. When several entries match, mapping order
/// decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptionMatch;

impl DescriptionMatch {
    fn needle(module: &str) -> String {
        format!("{}-api", module.to_lowercase())
    }
}

impl ApiPortResolver for DescriptionMatch {
    fn api_port(&self, state: &InfrastructureState, module: &str) -> Result<u16, StateError> {
        let needle = Self::needle(module);
        registry_entries(state)
            .into_iter()
            .find(|(_, desc)| desc.to_lowercase().contains(&needle))
            .map(|(port, _)| port)
            .ok_or_else(|| StateError::ApiPortNotFound(module.to_string()))
    }
}

/// Explicit `module -> port` table; ignores the document's registry.
#[derive(Debug, Clone, Default)]
pub struct PortTable {
    ports: IndexMap<String, u16>,
}

impl PortTable {
    pub fn new(ports: IndexMap<String, u16>) -> Self {
        Self { ports }
    }

    /// Build a table from a YAML mapping of `module: port`.
    pub fn from_value(value: &Value) -> Result<Self, StateError> {
        let ports: IndexMap<String, u16> = super::types::decode(value, "port table")?;
        Ok(Self::new(ports))
    }
}

impl ApiPortResolver for PortTable {
    fn api_port(&self, _state: &InfrastructureState, module: &str) -> Result<u16, StateError> {
        self.ports
            .get(module)
            .copied()
            .ok_or_else(|| StateError::ApiPortNotFound(module.to_string()))
    }
}
