//! IS-005: Compare local environment variables against the state document.

use super::query::get_db_config;
use super::types::{Discrepancy, EnvReport, InfrastructureState};
use crate::error::StateError;
use indexmap::IndexMap;

/// Environment variables checked for a module database, in report order.
pub const DB_ENV_KEYS: [&str; 4] = ["DB_PORT", "DB_USER", "DB_PASSWORD", "DB_NAME"];

/// Expected values of [`DB_ENV_KEYS`] for a module.
pub fn expected_env(
    state: &InfrastructureState,
    module: &str,
) -> Result<IndexMap<&'static str, String>, StateError> {
    let cfg = get_db_config(state, module)?;
    Ok(IndexMap::from([
        ("DB_PORT", cfg.port.to_string()),
        ("DB_USER", cfg.user),
        ("DB_PASSWORD", cfg.password),
        ("DB_NAME", cfg.database),
    ]))
}

/// Check observed variables against the module's database settings.
/// Absent keys land in `missing` only; present but different values land in
/// `discrepancies`.
pub fn validate_local_env(
    state: &InfrastructureState,
    module: &str,
    env: &IndexMap<String, String>,
) -> Result<EnvReport, StateError> {
    let expected = expected_env(state, module)?;

    let mut discrepancies = Vec::new();
    let mut missing = Vec::new();
    for (key, expected_value) in expected {
        match env.get(key) {
            None => missing.push(key.to_string()),
            Some(observed) if *observed != expected_value => discrepancies.push(Discrepancy {
                key: key.to_string(),
                observed: observed.clone(),
                expected: expected_value,
            }),
            Some(_) => {}
        }
    }

    Ok(EnvReport {
        valid: discrepancies.is_empty() && missing.is_empty(),
        discrepancies,
        missing,
    })
}

/// Read [`DB_ENV_KEYS`] from the process environment. Unset or non-UTF-8
/// variables are left out.
pub fn process_env() -> IndexMap<String, String> {
    DB_ENV_KEYS
        .iter()
        .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::fixtures;
    use crate::error::ErrorKind;

    fn matching_env() -> IndexMap<String, String> {
        IndexMap::from([
            ("DB_PORT".to_string(), "5434".to_string()),
            ("DB_USER".to_string(), "opa_user".to_string()),
            ("DB_PASSWORD".to_string(), "opa_pass".to_string()),
            ("DB_NAME".to_string(), "opa_capacity".to_string()),
        ])
    }

    #[test]
    fn test_is005_matching_env_is_valid() {
        let state = fixtures::sample();
        let report = validate_local_env(&state, "capacity", &matching_env()).unwrap();
        assert!(report.valid);
        assert!(report.discrepancies.is_empty());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_is005_one_mismatch() {
        let state = fixtures::sample();
        let mut env = matching_env();
        env.insert("DB_PORT".to_string(), "5432".to_string());
        let report = validate_local_env(&state, "capacity", &env).unwrap();
        assert!(!report.valid);
        assert_eq!(
            report.discrepancies,
            vec![Discrepancy {
                key: "DB_PORT".to_string(),
                observed: "5432".to_string(),
                expected: "5434".to_string(),
            }]
        );
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_is005_absent_key_only_in_missing() {
        let state = fixtures::sample();
        let mut env = matching_env();
        env.shift_remove("DB_PASSWORD");
        let report = validate_local_env(&state, "capacity", &env).unwrap();
        assert!(!report.valid);
        assert_eq!(report.missing, vec!["DB_PASSWORD"]);
        assert!(report.discrepancies.is_empty());
    }

    #[test]
    fn test_is005_empty_env_reports_all_missing_in_order() {
        let state = fixtures::sample();
        let report = validate_local_env(&state, "quotes", &IndexMap::new()).unwrap();
        assert_eq!(report.missing, DB_ENV_KEYS.to_vec());
    }

    #[test]
    fn test_is005_extra_vars_ignored() {
        let state = fixtures::sample();
        let mut env = matching_env();
        env.insert("DB_HOST".to_string(), "db.internal".to_string());
        assert!(validate_local_env(&state, "capacity", &env).unwrap().valid);
    }

    #[test]
    fn test_is005_unknown_module() {
        let state = fixtures::sample();
        let err = validate_local_env(&state, "ghost", &matching_env()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_is005_report_json_shape() {
        let state = fixtures::sample();
        let mut env = matching_env();
        env.insert("DB_USER".to_string(), "root".to_string());
        let report = validate_local_env(&state, "capacity", &env).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], serde_json::Value::Bool(false));
        assert_eq!(json["discrepancies"][0]["key"], "DB_USER");
        assert_eq!(json["discrepancies"][0]["expected"], "opa_user");
    }
}
