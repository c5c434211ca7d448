//! Policy definitions for the in-memory store.

use serde::{Deserialize, Serialize};

use warden_core::types::UserRole;

use super::condition::PolicyCondition;

fn default_priority() -> i64 {
    1
}

fn default_active() -> bool {
    true
}

/// A named, scoped policy granting actions to matching requests.
///
/// The filter lists (`realm`, `resolver`, `user`, `admin_realm`,
/// `admin_user`) restrict which requests the policy applies to; an empty
/// list leaves the attribute unrestricted. A `*` entry matches any
/// value. Conditions gate the policy further, per request data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub name: String,
    pub scope: UserRole,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub realm: Vec<String>,
    #[serde(default)]
    pub resolver: Vec<String>,
    #[serde(default)]
    pub user: Vec<String>,
    #[serde(default)]
    pub admin_realm: Vec<String>,
    #[serde(default)]
    pub admin_user: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub conditions: Vec<PolicyCondition>,
}

impl PolicyDefinition {
    /// Create an active policy with no filters or conditions.
    pub fn new(name: impl Into<String>, scope: UserRole) -> Self {
        Self {
            name: name.into(),
            scope,
            actions: Vec::new(),
            realm: Vec::new(),
            resolver: Vec::new(),
            user: Vec::new(),
            admin_realm: Vec::new(),
            admin_user: Vec::new(),
            priority: default_priority(),
            active: default_active(),
            conditions: Vec::new(),
        }
    }

    /// Grant an action.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    /// Restrict to a realm.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm.push(realm.into());
        self
    }

    /// Restrict to a resolver.
    pub fn with_resolver(mut self, resolver: impl Into<String>) -> Self {
        self.resolver.push(resolver.into());
        self
    }

    /// Restrict to a username.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user.push(user.into());
        self
    }

    /// Restrict to an admin realm.
    pub fn with_admin_realm(mut self, realm: impl Into<String>) -> Self {
        self.admin_realm.push(realm.into());
        self
    }

    /// Restrict to an admin username.
    pub fn with_admin_user(mut self, user: impl Into<String>) -> Self {
        self.admin_user.push(user.into());
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a condition.
    pub fn with_condition(mut self, condition: PolicyCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Deactivate the policy.
    pub fn disabled(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether this policy grants the given action.
    pub fn defines_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action || a == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_yaml() {
        let policy: PolicyDefinition = serde_yaml::from_str(
            "name: p1\nscope: admin\nactions: [enable, disable]\n",
        )
        .unwrap();
        assert_eq!(policy.name, "p1");
        assert_eq!(policy.scope, UserRole::Admin);
        assert!(policy.active);
        assert_eq!(policy.priority, 1);
        assert!(policy.realm.is_empty());
        assert!(policy.conditions.is_empty());
        assert!(policy.defines_action("enable"));
        assert!(!policy.defines_action("delete"));
    }

    #[test]
    fn wildcard_action() {
        let policy = PolicyDefinition::new("p", UserRole::Admin).with_action("*");
        assert!(policy.defines_action("enable"));
    }
}
