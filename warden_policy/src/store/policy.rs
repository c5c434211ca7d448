//! In-memory policy store.
//!
//! Holds policy definitions, loads them from YAML, and implements the
//! generic match: a query is allowed when some active policy in its
//! scope grants the action to the queried attributes with all of its
//! conditions fulfilled. An action no active policy in the scope
//! defines at all is unregulated and therefore allowed.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use warden_core::error::{PolicyError, Result};
use warden_core::traits::{ComparatorRegistry, ContainerStore, MatchQuery, PolicyMatcher, TokenStore};
use warden_core::types::ConditionInput;

use crate::engine::ConditionEvaluator;
use crate::model::PolicyDefinition;

/// An in-memory policy store, keyed by policy name.
pub struct InMemoryPolicyStore {
    policies: DashMap<String, PolicyDefinition>,

    /// Policy names by descending priority (cached for listing).
    ordered: RwLock<Vec<String>>,

    comparators: Arc<dyn ComparatorRegistry>,
    evaluator: ConditionEvaluator,
}

impl InMemoryPolicyStore {
    /// Create an empty store. The stores and registry are handed to the
    /// condition evaluator; the registry also validates conditions of
    /// added policies.
    pub fn new(
        token_store: Arc<dyn TokenStore>,
        container_store: Arc<dyn ContainerStore>,
        comparators: Arc<dyn ComparatorRegistry>,
    ) -> Self {
        Self {
            policies: DashMap::new(),
            ordered: RwLock::new(Vec::new()),
            comparators: comparators.clone(),
            evaluator: ConditionEvaluator::new(token_store, container_store, comparators),
        }
    }

    /// Add a policy.
    ///
    /// Fails on a duplicate name or when an active condition of the
    /// policy does not validate.
    pub fn add(&self, policy: PolicyDefinition) -> Result<()> {
        if self.policies.contains_key(&policy.name) {
            return Err(PolicyError::DuplicatePolicy(policy.name).into());
        }
        for condition in policy.conditions.iter().filter(|c| c.is_active()) {
            condition.validate(self.comparators.as_ref())?;
        }
        let name = policy.name.clone();
        self.policies.insert(name.clone(), policy);

        let mut ordered = self.ordered.write();
        ordered.push(name);
        let mut keyed: Vec<(i64, String)> = ordered
            .iter()
            .filter_map(|n| self.policies.get(n).map(|p| (p.priority, n.clone())))
            .collect();
        keyed.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        *ordered = keyed.into_iter().map(|(_, n)| n).collect();
        Ok(())
    }

    /// Remove a policy by name.
    pub fn remove(&self, name: &str) -> Option<PolicyDefinition> {
        let removed = self.policies.remove(name).map(|(_, policy)| policy);
        if removed.is_some() {
            self.ordered.write().retain(|n| n != name);
        }
        removed
    }

    /// Get a policy by name.
    pub fn get(&self, name: &str) -> Option<PolicyDefinition> {
        self.policies.get(name).map(|entry| entry.value().clone())
    }

    /// All policies, ordered by descending priority, then name.
    pub fn list(&self) -> Vec<PolicyDefinition> {
        let ordered = self.ordered.read();
        ordered
            .iter()
            .filter_map(|name| self.policies.get(name).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Load policies from a YAML document holding a list of policy
    /// definitions and add them all.
    pub fn load_yaml(&self, yaml: &str) -> Result<()> {
        let policies: Vec<PolicyDefinition> = serde_yaml::from_str(yaml)
            .map_err(|e| PolicyError::InvalidDefinition(e.to_string()))?;
        for policy in policies {
            self.add(policy)?;
        }
        Ok(())
    }

    /// Whether all conditions of a policy hold for the given input.
    ///
    /// Configuration errors (missing data under `raise_error`, broken
    /// comparators) propagate; they are never demoted to a non-match.
    fn conditions_match(&self, policy: &PolicyDefinition, input: &ConditionInput) -> Result<bool> {
        for condition in &policy.conditions {
            if !self.evaluator.evaluate(&policy.name, condition, input)? {
                debug!(
                    policy = %policy.name,
                    section = condition.section(),
                    key = condition.key(),
                    "condition not fulfilled, policy does not apply"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Whether an attribute filter list admits the queried value.
///
/// An empty list leaves the attribute unrestricted. An absent value
/// skips the filter entirely; an empty-string value matches only the
/// unrestricted (or wildcard) case. For realms, the additional realms
/// are consulted as well.
fn filter_matches(filter: &[String], value: Option<&str>, additional: Option<&[String]>) -> bool {
    if filter.is_empty() {
        return true;
    }
    let Some(value) = value else {
        return true;
    };
    if filter.iter().any(|f| f == "*") {
        return true;
    }
    if !value.is_empty() && filter.iter().any(|f| f == value) {
        return true;
    }
    if let Some(additional) = additional {
        if additional.iter().any(|realm| filter.iter().any(|f| f == realm)) {
            return true;
        }
    }
    false
}

impl PolicyMatcher for InMemoryPolicyStore {
    fn match_generic(&self, query: &MatchQuery) -> Result<bool> {
        let mut action_defined = false;
        let mut matched = false;

        for entry in self.policies.iter() {
            let policy = entry.value();
            if !policy.active || Some(policy.scope) != query.scope {
                continue;
            }
            if !policy.defines_action(&query.action) {
                continue;
            }
            action_defined = true;

            if !filter_matches(&policy.user, query.username.as_deref(), None)
                || !filter_matches(
                    &policy.realm,
                    query.realm.as_deref(),
                    query.additional_realms.as_deref(),
                )
                || !filter_matches(&policy.resolver, query.resolver.as_deref(), None)
                || !filter_matches(&policy.admin_user, query.admin_user.as_deref(), None)
                || !filter_matches(&policy.admin_realm, query.admin_realm.as_deref(), None)
            {
                continue;
            }

            if self.conditions_match(policy, &query.input)? {
                matched = true;
            }
        }

        if !action_defined {
            debug!(action = %query.action, "action is unregulated, allowing");
            return Ok(true);
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use warden_core::types::{TokenRecord, UserRole};

    use crate::compare::StandardComparators;
    use crate::model::PolicyCondition;
    use crate::store::{InMemoryContainerStore, InMemoryTokenStore};

    fn store() -> (Arc<InMemoryTokenStore>, InMemoryPolicyStore) {
        let tokens = Arc::new(InMemoryTokenStore::new());
        let store = InMemoryPolicyStore::new(
            tokens.clone(),
            Arc::new(InMemoryContainerStore::new()),
            Arc::new(StandardComparators::new()),
        );
        (tokens, store)
    }

    fn query(scope: UserRole, action: &str) -> MatchQuery {
        MatchQuery::new(scope, action)
    }

    #[test]
    fn unregulated_action_is_allowed() {
        let (_, store) = store();
        assert!(store.match_generic(&query(UserRole::Admin, "enable")).unwrap());

        store
            .add(PolicyDefinition::new("p1", UserRole::Admin).with_action("disable"))
            .unwrap();
        // "disable" is now regulated, "enable" still is not
        assert!(store.match_generic(&query(UserRole::Admin, "enable")).unwrap());
        assert!(store.match_generic(&query(UserRole::Admin, "disable")).unwrap());
    }

    #[test]
    fn scope_and_action_must_match() {
        let (_, store) = store();
        store
            .add(PolicyDefinition::new("p1", UserRole::User).with_action("enroll"))
            .unwrap();

        assert!(store.match_generic(&query(UserRole::User, "enroll")).unwrap());
        // Admin scope has no policy for "enroll", so it is unregulated there
        assert!(store.match_generic(&query(UserRole::Admin, "enroll")).unwrap());

        store
            .add(PolicyDefinition::new("p2", UserRole::Admin).with_action("delete"))
            .unwrap();
        assert!(store.match_generic(&query(UserRole::Admin, "delete")).unwrap());
    }

    #[test]
    fn absent_attribute_skips_the_filter_but_empty_does_not() {
        let (_, store) = store();
        store
            .add(
                PolicyDefinition::new("realm-scoped", UserRole::Admin)
                    .with_action("enable")
                    .with_realm("realm1"),
            )
            .unwrap();

        // Absent realm: filter skipped, policy matches
        let q = query(UserRole::Admin, "enable");
        assert!(store.match_generic(&q).unwrap());

        // Empty-string realm: only unrestricted policies match
        let mut q = query(UserRole::Admin, "enable");
        q.realm = Some(String::new());
        assert!(!store.match_generic(&q).unwrap());

        // Matching realm
        let mut q = query(UserRole::Admin, "enable");
        q.realm = Some("realm1".to_string());
        assert!(store.match_generic(&q).unwrap());

        // Additional realms rescue a non-matching primary realm
        let mut q = query(UserRole::Admin, "enable");
        q.realm = Some("realm9".to_string());
        q.additional_realms = Some(vec!["realm1".to_string()]);
        assert!(store.match_generic(&q).unwrap());
    }

    #[test]
    fn user_filter_and_wildcard() {
        let (_, store) = store();
        store
            .add(
                PolicyDefinition::new("alice-only", UserRole::User)
                    .with_action("enroll")
                    .with_user("alice"),
            )
            .unwrap();

        let mut q = query(UserRole::User, "enroll");
        q.username = Some("alice".to_string());
        assert!(store.match_generic(&q).unwrap());

        q.username = Some("bob".to_string());
        assert!(!store.match_generic(&q).unwrap());

        store
            .add(
                PolicyDefinition::new("everyone", UserRole::User)
                    .with_action("enroll")
                    .with_user("*"),
            )
            .unwrap();
        assert!(store.match_generic(&q).unwrap());
    }

    #[test]
    fn conditions_gate_the_policy() {
        let (tokens, store) = store();
        tokens.add(TokenRecord::new("OTP0001").with_info("tokenkind", "software"));

        let registry = StandardComparators::new();
        store
            .add(
                PolicyDefinition::new("software-only", UserRole::Admin)
                    .with_action("enable")
                    .with_condition(
                        PolicyCondition::new(
                            "tokeninfo",
                            "tokenkind",
                            "==",
                            "software",
                            true,
                            "raise_error",
                            &registry,
                        )
                        .unwrap(),
                    ),
            )
            .unwrap();

        let mut q = query(UserRole::Admin, "enable");
        q.input = ConditionInput::new().with_token_serial("OTP0001");
        assert!(store.match_generic(&q).unwrap());

        // Unknown serial: the condition cannot be evaluated, raise_error
        // fails the decision instead of failing open
        let mut q = query(UserRole::Admin, "enable");
        q.input = ConditionInput::new().with_token_serial("OTP9999");
        let err = store.match_generic(&q).unwrap_err();
        assert!(err.to_string().contains("software-only"));
    }

    #[test]
    fn inactive_policy_never_matches_and_leaves_action_unregulated() {
        let (_, store) = store();
        store
            .add(
                PolicyDefinition::new("disabled", UserRole::Admin)
                    .with_action("delete")
                    .with_realm("realm1")
                    .disabled(),
            )
            .unwrap();

        let mut q = query(UserRole::Admin, "delete");
        q.realm = Some("realm9".to_string());
        assert!(store.match_generic(&q).unwrap());
    }

    #[test]
    fn duplicate_names_and_invalid_conditions_are_rejected() {
        let (_, store) = store();
        store
            .add(PolicyDefinition::new("p1", UserRole::Admin).with_action("enable"))
            .unwrap();
        assert!(store
            .add(PolicyDefinition::new("p1", UserRole::Admin))
            .is_err());

        // An active-but-invalid condition can only come out of raw
        // deserialization; the store must reject it on add
        let condition: PolicyCondition = serde_yaml::from_str(
            "section: tokeninfo\nkey: tokenkind\ncomparator: '~~~'\nvalue: x\nactive: true\n",
        )
        .unwrap();
        let broken = PolicyDefinition::new("p2", UserRole::Admin)
            .with_action("enable")
            .with_condition(condition);
        assert!(store.add(broken).is_err());
    }

    #[test]
    fn listing_orders_by_priority_then_name() {
        let (_, store) = store();
        store
            .add(PolicyDefinition::new("low", UserRole::Admin).with_priority(1))
            .unwrap();
        store
            .add(PolicyDefinition::new("high", UserRole::Admin).with_priority(10))
            .unwrap();
        store
            .add(PolicyDefinition::new("also-high", UserRole::Admin).with_priority(10))
            .unwrap();

        let names: Vec<String> = store.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["also-high", "high", "low"]);

        store.remove("high");
        let names: Vec<String> = store.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["also-high", "low"]);
    }

    #[test]
    fn yaml_round_trip() {
        let (_, store) = store();
        store
            .load_yaml(
                r#"
- name: admin-helpdesk
  scope: admin
  actions: [enable, disable]
  realm: [realm1]
  conditions:
    - section: tokeninfo
      key: tokenkind
      comparator: "=="
      value: software
      active: true
- name: user-selfservice
  scope: user
  actions: [enroll]
"#,
            )
            .unwrap();

        assert!(store.get("admin-helpdesk").is_some());
        assert_eq!(store.list().len(), 2);
        // Duplicate name from a second load
        assert!(store.load_yaml("- name: admin-helpdesk\n  scope: admin\n").is_err());
        // Not a policy list at all
        assert!(store.load_yaml("scope: admin").is_err());
    }
}
