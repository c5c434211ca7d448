//! Error types for the Warden engine.
//!
//! This module defines a structured error hierarchy that keeps
//! misconfigured policies (hard failures, fail closed) clearly apart
//! from denied actions (ordinary `Ok(false)` results).

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the Warden engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),
}

/// Errors caused by invalid input from the caller.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Unknown user role: {0}")]
    UnknownRole(String),

    #[error("Acting user has no role")]
    MissingRole,

    #[error("Condition field '{field}' is invalid: {reason}")]
    InvalidConditionField { field: String, reason: String },
}

/// Errors caused by a broken or unresolvable policy definition.
///
/// These are configuration errors: they must surface to the caller as
/// hard failures, distinct from "denied", so operators can tell a broken
/// policy apart from a missing permission.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(
        "Policy '{policy}' has a condition on {section}.{key}, but {missing} is not available{}",
        format_available(.available_keys)
    )]
    MissingConditionData {
        policy: String,
        section: String,
        key: String,
        missing: String,
        available_keys: Option<Vec<String>>,
    },

    #[error("Unknown condition section: {0}")]
    UnknownSection(String),

    #[error("Unknown comparator: {0}")]
    UnknownComparator(String),

    #[error("Unknown missing-data policy: {0}")]
    UnknownMissingDataPolicy(String),

    #[error("Comparison with '{comparator}' failed: {reason}")]
    CompareFailed { comparator: String, reason: String },

    #[error("Policy '{0}' already exists")]
    DuplicatePolicy(String),

    #[error("Invalid policy definition: {0}")]
    InvalidDefinition(String),

    #[error("Policy '{policy}': condition on {section}.{key} could not be compared: {reason}")]
    ConditionEvaluation {
        policy: String,
        section: String,
        key: String,
        reason: String,
    },
}

fn format_available(available: &Option<Vec<String>>) -> String {
    match available {
        Some(keys) => format!(" (available keys: {})", keys.join(", ")),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_error_names_policy_section_and_key() {
        let err = PolicyError::MissingConditionData {
            policy: "pol1".to_string(),
            section: "tokeninfo".to_string(),
            key: "count_auth".to_string(),
            missing: "count_auth".to_string(),
            available_keys: Some(vec!["hashlib".to_string(), "tokenkind".to_string()]),
        };
        let text = err.to_string();
        assert!(text.contains("pol1"));
        assert!(text.contains("tokeninfo"));
        assert!(text.contains("count_auth"));
        assert!(text.contains("hashlib, tokenkind"));
    }

    #[test]
    fn missing_data_error_without_key_listing() {
        let err = PolicyError::MissingConditionData {
            policy: "pol1".to_string(),
            section: "token".to_string(),
            key: "failcount".to_string(),
            missing: "token".to_string(),
            available_keys: None,
        };
        assert!(!err.to_string().contains("available keys"));
    }
}
