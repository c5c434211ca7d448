//! Trait seams for the engine's collaborators.
//!
//! The engine performs read-only lookups through these traits and never
//! holds state of its own, so every implementation must be safe to share
//! across request-handling threads.

use serde_json::Value;

use crate::error::Result;
use crate::types::{ConditionInput, ContainerRecord, TokenRecord, UserRole};

/// Read access to the token inventory.
pub trait TokenStore: Send + Sync {
    /// Look up a token by serial.
    ///
    /// `Ok(None)` means the serial is unknown; this is a legitimate
    /// authorization state (an unassigned or deleted token), not a fault.
    fn find_by_serial(&self, serial: &str) -> Result<Option<TokenRecord>>;
}

/// Read access to the container inventory.
pub trait ContainerStore: Send + Sync {
    /// Look up a container by serial.
    fn find_by_serial(&self, serial: &str) -> Result<Option<ContainerRecord>>;

    /// Find the container currently holding a token, if any.
    fn find_for_token(&self, token_serial: &str) -> Result<Option<ContainerRecord>>;
}

/// A generic policy-match query.
///
/// Attribute fields are tri-state: `None` skips the corresponding policy
/// filter entirely, `Some("")` matches only policies that do not restrict
/// the attribute, and a non-empty value must be listed by the policy (or
/// the policy must leave the attribute unrestricted).
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    pub scope: Option<UserRole>,
    pub action: String,
    pub username: Option<String>,
    pub resolver: Option<String>,
    pub realm: Option<String>,
    pub admin_realm: Option<String>,
    pub admin_user: Option<String>,
    pub additional_realms: Option<Vec<String>>,
    /// Data sources for evaluating policy conditions, if the store does so.
    pub input: ConditionInput,
}

impl MatchQuery {
    /// Create a query for a scope and action.
    pub fn new(scope: UserRole, action: impl Into<String>) -> Self {
        Self {
            scope: Some(scope),
            action: action.into(),
            ..Default::default()
        }
    }
}

/// The policy store's generic match operation.
///
/// The store selects candidate policies for the query and reports whether
/// any of them grants the action. Condition-evaluation failures inside the
/// store are configuration errors and must propagate, never demote to a
/// non-match.
pub trait PolicyMatcher: Send + Sync {
    fn match_generic(&self, query: &MatchQuery) -> Result<bool>;
}

/// The comparator registry used to evaluate condition values.
pub trait ComparatorRegistry: Send + Sync {
    /// Compare an observed value against a condition's expected value.
    ///
    /// Fails with `PolicyError::UnknownComparator` for unknown kinds; a
    /// failed comparison (bad operand types, invalid pattern) is an error,
    /// not a non-match.
    fn compare(&self, observed: &Value, comparator: &str, expected: &str) -> Result<bool>;

    /// Whether a comparator name is known to this registry.
    fn contains(&self, comparator: &str) -> bool;
}
