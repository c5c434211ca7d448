//! Condition evaluation.
//!
//! Fetches the data a condition reads from and applies its comparator,
//! consulting the condition's missing-data policy when the backing
//! object or the key cannot be resolved.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use warden_core::error::{PolicyError, Result};
use warden_core::traits::{ComparatorRegistry, ContainerStore, TokenStore};
use warden_core::types::ConditionInput;

use crate::model::{PolicyCondition, Section, SectionData};

/// Evaluates policy conditions against per-request data.
///
/// Stateless; the stores and the comparator registry are injected so
/// tests can substitute stubs.
pub struct ConditionEvaluator {
    token_store: Arc<dyn TokenStore>,
    container_store: Arc<dyn ContainerStore>,
    comparators: Arc<dyn ComparatorRegistry>,
}

impl ConditionEvaluator {
    /// Create a new evaluator.
    pub fn new(
        token_store: Arc<dyn TokenStore>,
        container_store: Arc<dyn ContainerStore>,
        comparators: Arc<dyn ComparatorRegistry>,
    ) -> Self {
        Self {
            token_store,
            container_store,
            comparators,
        }
    }

    /// The registry conditions are validated against.
    pub fn comparators(&self) -> &dyn ComparatorRegistry {
        self.comparators.as_ref()
    }

    /// Evaluate one condition of the named policy.
    ///
    /// An inactive condition never blocks a policy. Errors identify the
    /// policy, the section and the key; a comparator failure is never
    /// demoted to a non-match.
    pub fn evaluate(
        &self,
        policy_name: &str,
        condition: &PolicyCondition,
        input: &ConditionInput,
    ) -> Result<bool> {
        if !condition.is_active() {
            return Ok(true);
        }

        let section = condition.parsed_section()?;
        let data = self.fetch(section, condition.key(), input)?;

        if !data.object_available {
            return condition.missing_data_policy()?.resolve(
                policy_name,
                section,
                condition.key(),
                &data.object_name,
                None,
            );
        }

        let value = match data.value {
            Some(value) => value,
            None => {
                return condition.missing_data_policy()?.resolve(
                    policy_name,
                    section,
                    condition.key(),
                    condition.key(),
                    data.available_keys.as_deref(),
                );
            }
        };

        self.comparators
            .compare(&value, condition.comparator(), condition.value())
            .map_err(|e| {
                PolicyError::ConditionEvaluation {
                    policy: policy_name.to_string(),
                    section: section.as_str().to_string(),
                    key: condition.key().to_string(),
                    reason: e.to_string(),
                }
                .into()
            })
    }

    /// Fetch the section data for a key, using the input source that
    /// matches the section.
    fn fetch(&self, section: Section, key: &str, input: &ConditionInput) -> Result<SectionData> {
        let object = section.object_name();
        match section {
            Section::UserInfo => Ok(match &input.user {
                Some(user) => lookup(object, &user.info, key),
                None => SectionData::unavailable(object),
            }),
            Section::Token | Section::TokenInfo => {
                let serial = input.token_serial.as_deref().filter(|s| !s.is_empty());
                let token = match serial {
                    Some(serial) => self.token_store.find_by_serial(serial)?,
                    None => None,
                };
                Ok(match token {
                    Some(token) => {
                        let map = if section == Section::Token {
                            &token.attributes
                        } else {
                            &token.info
                        };
                        lookup(object, map, key)
                    }
                    None => SectionData::unavailable(object),
                })
            }
            Section::Container | Section::ContainerInfo => {
                let serial = input.container_serial.as_deref().filter(|s| !s.is_empty());
                let container = match serial {
                    Some(serial) => self.container_store.find_by_serial(serial)?,
                    None => None,
                };
                Ok(match container {
                    Some(container) => {
                        let map = if section == Section::Container {
                            &container.attributes
                        } else {
                            &container.info
                        };
                        lookup(object, map, key)
                    }
                    None => SectionData::unavailable(object),
                })
            }
            Section::HttpHeader => Ok(match &input.request {
                Some(request) => match request.header(key) {
                    Some(value) => SectionData::found(object, Value::String(value.clone())),
                    None => SectionData::key_missing(
                        object,
                        request.headers.keys().cloned().collect(),
                    ),
                },
                None => SectionData::unavailable(object),
            }),
            Section::HttpEnvironment => Ok(match &input.request {
                Some(request) => match request.environment.get(key) {
                    Some(value) => SectionData::found(object, Value::String(value.clone())),
                    None => SectionData::key_missing(
                        object,
                        request.environment.keys().cloned().collect(),
                    ),
                },
                None => SectionData::unavailable(object),
            }),
            Section::RequestData => Ok(match &input.request_data {
                Some(data) => lookup(object, data, key),
                None => SectionData::unavailable(object),
            }),
        }
    }
}

fn lookup(object: &str, map: &HashMap<String, Value>, key: &str) -> SectionData {
    match map.get(key) {
        Some(value) => SectionData::found(object, value.clone()),
        None => SectionData::key_missing(object, map.keys().cloned().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use warden_core::types::{RequestMetadata, TokenRecord, UserEntry, UserIdentity};

    use crate::compare::StandardComparators;
    use crate::store::{InMemoryContainerStore, InMemoryTokenStore};

    fn evaluator() -> (Arc<InMemoryTokenStore>, Arc<InMemoryContainerStore>, ConditionEvaluator) {
        let tokens = Arc::new(InMemoryTokenStore::new());
        let containers = Arc::new(InMemoryContainerStore::new());
        let evaluator = ConditionEvaluator::new(
            tokens.clone(),
            containers.clone(),
            Arc::new(StandardComparators::new()),
        );
        (tokens, containers, evaluator)
    }

    fn condition(section: &str, key: &str, comparator: &str, value: &str) -> PolicyCondition {
        PolicyCondition::new(
            section,
            key,
            comparator,
            value,
            true,
            "raise_error",
            &StandardComparators::new(),
        )
        .unwrap()
    }

    #[test]
    fn inactive_condition_never_blocks() {
        let (_, _, evaluator) = evaluator();
        let condition =
            PolicyCondition::inactive("nonsense", "", "~~~", "", "whatever");
        // No data sources at all: still true
        assert!(evaluator
            .evaluate("p", &condition, &ConditionInput::new())
            .unwrap());
    }

    #[test]
    fn userinfo_condition_matches_user_attributes() {
        let (_, _, evaluator) = evaluator();
        let user = UserEntry::new(UserIdentity::new("alice", "realm1", "resolver1"))
            .with_info("groups", json!(["helpdesk", "audit"]))
            .with_info("phone", "123456");
        let input = ConditionInput::new().with_user(user);

        assert!(evaluator
            .evaluate("p", &condition("userinfo", "groups", "contains", "helpdesk"), &input)
            .unwrap());
        assert!(!evaluator
            .evaluate("p", &condition("userinfo", "phone", "==", "999"), &input)
            .unwrap());
    }

    #[test]
    fn tokeninfo_condition_reads_token_metadata() {
        let (tokens, _, evaluator) = evaluator();
        tokens.add(
            TokenRecord::new("OTP0001")
                .with_attribute("tokentype", "hotp")
                .with_info("tokenkind", "software"),
        );
        let input = ConditionInput::new().with_token_serial("OTP0001");

        assert!(evaluator
            .evaluate("p", &condition("tokeninfo", "tokenkind", "==", "software"), &input)
            .unwrap());
        assert!(evaluator
            .evaluate("p", &condition("token", "tokentype", "in", "hotp, totp"), &input)
            .unwrap());
    }

    #[test]
    fn missing_object_follows_the_missing_data_policy() {
        let (_, _, evaluator) = evaluator();
        // Serial for a token that does not exist
        let input = ConditionInput::new().with_token_serial("OTP9999");
        let registry = StandardComparators::new();

        let raise = condition("tokeninfo", "tokenkind", "==", "software");
        let err = evaluator.evaluate("p1", &raise, &input).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("p1"));
        assert!(text.contains("tokeninfo"));
        assert!(text.contains("tokenkind"));

        let as_true = PolicyCondition::new(
            "tokeninfo", "tokenkind", "==", "software", true, "condition_true", &registry,
        )
        .unwrap();
        assert!(evaluator.evaluate("p1", &as_true, &input).unwrap());

        let as_false = PolicyCondition::new(
            "tokeninfo", "tokenkind", "==", "software", true, "condition_false", &registry,
        )
        .unwrap();
        assert!(!evaluator.evaluate("p1", &as_false, &input).unwrap());
    }

    #[test]
    fn missing_key_reports_available_keys() {
        let (tokens, _, evaluator) = evaluator();
        tokens.add(
            TokenRecord::new("OTP0001")
                .with_info("hashlib", "sha1")
                .with_info("tokenkind", "software"),
        );
        let input = ConditionInput::new().with_token_serial("OTP0001");

        let err = evaluator
            .evaluate("p1", &condition("tokeninfo", "count_auth", "<", "100"), &input)
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("hashlib"));
        assert!(text.contains("tokenkind"));
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_environment_is_exact() {
        let (_, _, evaluator) = evaluator();
        let request = RequestMetadata::new()
            .with_header("User-Agent", "privacyidea-cp/2.1")
            .with_environment("REMOTE_ADDR", "10.1.2.3");
        let input = ConditionInput::new().with_request(request);

        assert!(evaluator
            .evaluate(
                "p",
                &condition("http_header", "user-agent", "matches", "privacyidea-cp.*"),
                &input
            )
            .unwrap());
        assert!(evaluator
            .evaluate(
                "p",
                &condition("http_environment", "REMOTE_ADDR", "matches", "10\\..*"),
                &input
            )
            .unwrap());
        assert!(evaluator
            .evaluate("p", &condition("http_environment", "remote_addr", "==", "x"), &input)
            .is_err());
    }

    #[test]
    fn request_data_condition() {
        let (_, _, evaluator) = evaluator();
        let mut data = HashMap::new();
        data.insert("transaction_id".to_string(), json!("0123456789"));
        let input = ConditionInput::new().with_request_data(data);

        assert!(evaluator
            .evaluate("p", &condition("request_data", "transaction_id", "matches", "\\d+"), &input)
            .unwrap());
    }

    #[test]
    fn comparator_failure_names_the_policy() {
        let (tokens, _, evaluator) = evaluator();
        tokens.add(TokenRecord::new("OTP0001").with_info("tokenkind", "software"));
        let input = ConditionInput::new().with_token_serial("OTP0001");

        // "tokenkind" is not a number, so ordering must fail loudly
        let err = evaluator
            .evaluate("broken", &condition("tokeninfo", "tokenkind", "<", "5"), &input)
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn empty_serial_means_no_backing_token() {
        let (_, _, evaluator) = evaluator();
        let registry = StandardComparators::new();
        let input = ConditionInput::new().with_token_serial("");

        let as_false = PolicyCondition::new(
            "token", "serial", "matches", ".*", true, "condition_false", &registry,
        )
        .unwrap();
        assert!(!evaluator.evaluate("p", &as_false, &input).unwrap());
    }
}
