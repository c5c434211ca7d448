//! Policy conditions and their validity rules.
//!
//! A condition may hold invalid field values only while it is inactive;
//! this supports editing a condition in a disabled state before
//! validating it. Activation re-validates the whole tuple atomically.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use warden_core::error::{ParameterError, PolicyError, Result};
use warden_core::traits::ComparatorRegistry;

/// The closed set of data sections a condition can read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Attributes of the acting user's store entry.
    UserInfo,

    /// Attributes of the token itself (serial, type, fail count, ...).
    Token,

    /// Key-value metadata attached to the token.
    TokenInfo,

    /// HTTP request headers.
    HttpHeader,

    /// HTTP request environment.
    HttpEnvironment,

    /// Attributes of the container itself.
    Container,

    /// Key-value metadata attached to the container.
    ContainerInfo,

    /// The free-form request payload.
    RequestData,
}

impl Section {
    /// All sections, for diagnostics.
    pub const ALL: [Section; 8] = [
        Section::UserInfo,
        Section::Token,
        Section::TokenInfo,
        Section::HttpHeader,
        Section::HttpEnvironment,
        Section::Container,
        Section::ContainerInfo,
        Section::RequestData,
    ];

    /// The section tag used in stored conditions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::UserInfo => "userinfo",
            Section::Token => "token",
            Section::TokenInfo => "tokeninfo",
            Section::HttpHeader => "http_header",
            Section::HttpEnvironment => "http_environment",
            Section::Container => "container",
            Section::ContainerInfo => "container_info",
            Section::RequestData => "request_data",
        }
    }

    /// The label of the object backing this section, used in
    /// missing-data diagnostics.
    pub fn object_name(&self) -> &'static str {
        match self {
            Section::UserInfo => "user",
            Section::Token | Section::TokenInfo => "token",
            Section::Container | Section::ContainerInfo => "container",
            Section::HttpHeader => "http_header",
            Section::HttpEnvironment => "http_environment",
            Section::RequestData => "request_data",
        }
    }
}

impl FromStr for Section {
    type Err = PolicyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "userinfo" => Ok(Section::UserInfo),
            "token" => Ok(Section::Token),
            "tokeninfo" => Ok(Section::TokenInfo),
            "http_header" => Ok(Section::HttpHeader),
            "http_environment" => Ok(Section::HttpEnvironment),
            "container" => Ok(Section::Container),
            "container_info" => Ok(Section::ContainerInfo),
            "request_data" => Ok(Section::RequestData),
            other => Err(PolicyError::UnknownSection(other.to_string())),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behavior when a condition references data that does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingDataPolicy {
    /// Fail the decision with a configuration error (fail closed).
    #[default]
    RaiseError,

    /// Treat the condition as satisfied; the policy stays a candidate.
    ConditionTrue,

    /// Treat the condition as failed; the policy is excluded.
    ConditionFalse,
}

impl MissingDataPolicy {
    /// The tag used in stored conditions.
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingDataPolicy::RaiseError => "raise_error",
            MissingDataPolicy::ConditionTrue => "condition_true",
            MissingDataPolicy::ConditionFalse => "condition_false",
        }
    }

    /// Resolve a condition whose data could not be fetched.
    ///
    /// A pure three-way function: `Err` under `raise_error`, otherwise
    /// the configured boolean, independent of comparator and value.
    pub fn resolve(
        &self,
        policy: &str,
        section: Section,
        key: &str,
        missing: &str,
        available_keys: Option<&[String]>,
    ) -> Result<bool> {
        match self {
            MissingDataPolicy::RaiseError => Err(PolicyError::MissingConditionData {
                policy: policy.to_string(),
                section: section.as_str().to_string(),
                key: key.to_string(),
                missing: missing.to_string(),
                available_keys: available_keys.map(|k| k.to_vec()),
            }
            .into()),
            MissingDataPolicy::ConditionTrue => {
                debug!(
                    policy,
                    section = section.as_str(),
                    key,
                    missing,
                    "missing condition data, treating condition as fulfilled"
                );
                Ok(true)
            }
            MissingDataPolicy::ConditionFalse => {
                debug!(
                    policy,
                    section = section.as_str(),
                    key,
                    missing,
                    "missing condition data, treating condition as failed"
                );
                Ok(false)
            }
        }
    }
}

impl FromStr for MissingDataPolicy {
    type Err = PolicyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "raise_error" => Ok(MissingDataPolicy::RaiseError),
            "condition_true" => Ok(MissingDataPolicy::ConditionTrue),
            "condition_false" => Ok(MissingDataPolicy::ConditionFalse),
            other => Err(PolicyError::UnknownMissingDataPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for MissingDataPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of fetching a section's data for one evaluation.
#[derive(Debug, Clone)]
pub struct SectionData {
    /// Label of the backing object.
    pub object_name: String,

    /// Whether the backing object could be resolved at all.
    pub object_available: bool,

    /// The resolved attribute value, if the key was found.
    pub value: Option<Value>,

    /// The object's full key set, populated only when the key was not
    /// found, for diagnostics.
    pub available_keys: Option<Vec<String>>,
}

impl SectionData {
    /// Data for a backing object that could not be resolved.
    pub fn unavailable(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            object_available: false,
            value: None,
            available_keys: None,
        }
    }

    /// Data for a resolved object whose key was found.
    pub fn found(object_name: impl Into<String>, value: Value) -> Self {
        Self {
            object_name: object_name.into(),
            object_available: true,
            value: Some(value),
            available_keys: None,
        }
    }

    /// Data for a resolved object that does not have the key.
    pub fn key_missing(object_name: impl Into<String>, mut available_keys: Vec<String>) -> Self {
        available_keys.sort();
        Self {
            object_name: object_name.into(),
            object_available: true,
            value: None,
            available_keys: Some(available_keys),
        }
    }
}

fn default_handle_missing_data() -> String {
    MissingDataPolicy::RaiseError.as_str().to_string()
}

/// A single policy condition: an attribute test gating whether a policy
/// applies to the current request.
///
/// Field values are stored as written; the validity of the tuple is only
/// enforced while the condition is active. Deserialized conditions are
/// re-validated by the store before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCondition {
    section: String,
    key: String,
    comparator: String,
    value: String,
    #[serde(default)]
    active: bool,
    #[serde(default = "default_handle_missing_data")]
    handle_missing_data: String,
}

impl PolicyCondition {
    /// Create a condition, activating it right away if requested.
    ///
    /// Activation validates the whole tuple against `registry`; on
    /// failure the constructor errors and no condition is produced.
    pub fn new(
        section: impl Into<String>,
        key: impl Into<String>,
        comparator: impl Into<String>,
        value: impl Into<String>,
        active: bool,
        handle_missing_data: impl Into<String>,
        registry: &dyn ComparatorRegistry,
    ) -> Result<Self> {
        let mut condition = Self::inactive(section, key, comparator, value, handle_missing_data);
        if active {
            condition.activate(registry)?;
        }
        Ok(condition)
    }

    /// Create an inactive condition. No validation is performed; any
    /// field may hold an invalid value until activation.
    pub fn inactive(
        section: impl Into<String>,
        key: impl Into<String>,
        comparator: impl Into<String>,
        value: impl Into<String>,
        handle_missing_data: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            key: key.into(),
            comparator: comparator.into(),
            value: value.into(),
            active: false,
            handle_missing_data: handle_missing_data.into(),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn comparator(&self) -> &str {
        &self.comparator
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn handle_missing_data(&self) -> &str {
        &self.handle_missing_data
    }

    /// The parsed section tag.
    pub fn parsed_section(&self) -> Result<Section> {
        Ok(self.section.parse()?)
    }

    /// The parsed missing-data policy.
    pub fn missing_data_policy(&self) -> Result<MissingDataPolicy> {
        Ok(self.handle_missing_data.parse()?)
    }

    /// Validate every field of the condition.
    ///
    /// Reports the first invalid field; does not change the condition.
    pub fn validate(&self, registry: &dyn ComparatorRegistry) -> Result<()> {
        if self.section.parse::<Section>().is_err() {
            return Err(invalid_field("section", format!("unknown section '{}'", self.section)));
        }
        if self.key.is_empty() {
            return Err(invalid_field("key", "key must not be empty".to_string()));
        }
        if !registry.contains(&self.comparator) {
            return Err(invalid_field(
                "comparator",
                format!("unknown comparator '{}'", self.comparator),
            ));
        }
        if self.value.is_empty() {
            return Err(invalid_field("value", "value must not be empty".to_string()));
        }
        if self.handle_missing_data.parse::<MissingDataPolicy>().is_err() {
            return Err(invalid_field(
                "handle_missing_data",
                format!("unknown missing-data policy '{}'", self.handle_missing_data),
            ));
        }
        Ok(())
    }

    /// Activate the condition, re-validating the whole tuple.
    ///
    /// On failure the condition stays inactive and unchanged.
    pub fn activate(&mut self, registry: &dyn ComparatorRegistry) -> Result<()> {
        self.validate(registry)?;
        self.active = true;
        Ok(())
    }

    /// Deactivate the condition. Always succeeds.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Set the section. Rejected on an active condition if the tag is
    /// not in the closed section set.
    pub fn set_section(&mut self, section: impl Into<String>) -> Result<()> {
        let section = section.into();
        if self.active && section.parse::<Section>().is_err() {
            return Err(invalid_field("section", format!("unknown section '{}'", section)));
        }
        self.section = section;
        Ok(())
    }

    /// Set the key. Rejected on an active condition if empty.
    pub fn set_key(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        if self.active && key.is_empty() {
            return Err(invalid_field("key", "key must not be empty".to_string()));
        }
        self.key = key;
        Ok(())
    }

    /// Set the comparator. Rejected on an active condition if the
    /// registry does not know it.
    pub fn set_comparator(
        &mut self,
        comparator: impl Into<String>,
        registry: &dyn ComparatorRegistry,
    ) -> Result<()> {
        let comparator = comparator.into();
        if self.active && !registry.contains(&comparator) {
            return Err(invalid_field(
                "comparator",
                format!("unknown comparator '{}'", comparator),
            ));
        }
        self.comparator = comparator;
        Ok(())
    }

    /// Set the expected value. Rejected on an active condition if empty.
    pub fn set_value(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        if self.active && value.is_empty() {
            return Err(invalid_field("value", "value must not be empty".to_string()));
        }
        self.value = value;
        Ok(())
    }

    /// Set the missing-data policy. Rejected on an active condition if
    /// the tag is unknown.
    pub fn set_handle_missing_data(&mut self, policy: impl Into<String>) -> Result<()> {
        let policy = policy.into();
        if self.active && policy.parse::<MissingDataPolicy>().is_err() {
            return Err(invalid_field(
                "handle_missing_data",
                format!("unknown missing-data policy '{}'", policy),
            ));
        }
        self.handle_missing_data = policy;
        Ok(())
    }
}

fn invalid_field(field: &str, reason: String) -> warden_core::Error {
    ParameterError::InvalidConditionField {
        field: field.to_string(),
        reason,
    }
    .into()
}
