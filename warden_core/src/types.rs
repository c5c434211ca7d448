//! Domain types exchanged between the engine and its callers.
//!
//! Attribute fields are `Option<String>` throughout: an absent attribute
//! and an empty-string attribute carry different authorization meaning
//! (absent skips a policy filter entirely, empty string matches only
//! policies that do not restrict that attribute).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParameterError;

/// The role an actor holds when requesting an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// An administrator acting on behalf of other users.
    Admin,

    /// An end user acting on their own resources.
    User,
}

impl UserRole {
    /// The scope tag used when matching policies.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

impl FromStr for UserRole {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            other => Err(ParameterError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user identity as a (username, realm, resolver) triple.
///
/// Two identities are the same user iff all three components are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub username: String,
    pub realm: String,
    pub resolver: String,
}

impl UserIdentity {
    /// Create a new identity.
    pub fn new(
        username: impl Into<String>,
        realm: impl Into<String>,
        resolver: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            realm: realm.into(),
            resolver: resolver.into(),
        }
    }

    /// Whether this identity names nobody at all.
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.realm.is_empty() && self.resolver.is_empty()
    }
}

/// The normalized attribute set used for policy matching.
///
/// Produced fresh per authorization decision; one instance describes the
/// actor, a second one the owner of the targeted token or container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttributes {
    pub role: Option<UserRole>,
    pub username: Option<String>,
    pub realm: Option<String>,
    pub resolver: Option<String>,
    pub admin_user: Option<String>,
    pub admin_realm: Option<String>,
    pub additional_realms: Option<Vec<String>>,
}

impl UserAttributes {
    /// Attributes for an end user acting as themselves.
    pub fn for_user(username: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            role: Some(UserRole::User),
            username: Some(username.into()),
            realm: Some(realm.into()),
            ..Default::default()
        }
    }

    /// Attributes for an administrator.
    pub fn for_admin(admin_user: impl Into<String>, admin_realm: impl Into<String>) -> Self {
        Self {
            role: Some(UserRole::Admin),
            admin_user: Some(admin_user.into()),
            admin_realm: Some(admin_realm.into()),
            ..Default::default()
        }
    }

    /// Set the resolver.
    pub fn with_resolver(mut self, resolver: impl Into<String>) -> Self {
        self.resolver = Some(resolver.into());
        self
    }

    /// The identity triple of these attributes, absent fields as empty.
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            username: self.username.clone().unwrap_or_default(),
            realm: self.realm.clone().unwrap_or_default(),
            resolver: self.resolver.clone().unwrap_or_default(),
        }
    }
}

/// A resolved user together with its attribute store data.
///
/// The `info` map backs the `userinfo` condition section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserEntry {
    pub identity: UserIdentity,
    pub info: HashMap<String, Value>,
}

impl UserEntry {
    /// Create a new entry without attribute data.
    pub fn new(identity: UserIdentity) -> Self {
        Self {
            identity,
            info: HashMap::new(),
        }
    }

    /// Add a userinfo attribute.
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }
}

/// A token as seen by the engine.
///
/// `attributes` backs the `token` condition section, `info` the
/// `tokeninfo` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub serial: String,
    pub attributes: HashMap<String, Value>,
    pub info: HashMap<String, Value>,
    pub owner: Option<UserIdentity>,
    pub realms: Vec<String>,
    pub container_serial: Option<String>,
}

impl TokenRecord {
    /// Create a new token record. The serial is mirrored into the
    /// attribute map so conditions can match on it.
    pub fn new(serial: impl Into<String>) -> Self {
        let serial = serial.into();
        let mut attributes = HashMap::new();
        attributes.insert("serial".to_string(), Value::String(serial.clone()));
        Self {
            serial,
            attributes,
            info: HashMap::new(),
            owner: None,
            realms: Vec::new(),
            container_serial: None,
        }
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner: UserIdentity) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set the realm list.
    pub fn with_realms(mut self, realms: Vec<String>) -> Self {
        self.realms = realms;
        self
    }

    /// Add a token attribute (the `token` section).
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a tokeninfo entry (the `tokeninfo` section).
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    /// Record which container currently holds this token.
    pub fn in_container(mut self, container_serial: impl Into<String>) -> Self {
        self.container_serial = Some(container_serial.into());
        self
    }
}

/// A token container as seen by the engine.
///
/// `owners` is ordered; the first entry is the authoritative owner for
/// ownership checks. `attributes` backs the `container` section, `info`
/// the `container_info` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub serial: String,
    pub attributes: HashMap<String, Value>,
    pub info: HashMap<String, Value>,
    pub owners: Vec<UserIdentity>,
    pub realms: Vec<String>,
}

impl ContainerRecord {
    /// Create a new container record.
    pub fn new(serial: impl Into<String>) -> Self {
        let serial = serial.into();
        let mut attributes = HashMap::new();
        attributes.insert("serial".to_string(), Value::String(serial.clone()));
        Self {
            serial,
            attributes,
            info: HashMap::new(),
            owners: Vec::new(),
            realms: Vec::new(),
        }
    }

    /// Append an owner.
    pub fn with_owner(mut self, owner: UserIdentity) -> Self {
        self.owners.push(owner);
        self
    }

    /// Set the realm list.
    pub fn with_realms(mut self, realms: Vec<String>) -> Self {
        self.realms = realms;
        self
    }

    /// Add a container attribute (the `container` section).
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a container-info entry (the `container_info` section).
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }
}

/// HTTP request metadata backing the header and environment sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub headers: HashMap<String, String>,
    pub environment: HashMap<String, String>,
}

impl RequestMetadata {
    /// Create empty request metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add an environment entry.
    pub fn with_environment(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name.into(), value.into());
        self
    }

    /// Look up a header, case-insensitively per HTTP semantics.
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }
}

/// The per-request data sources a condition may read from.
///
/// Every field is optional; a condition whose section has no backing
/// data here reports the object as unavailable and falls back to its
/// missing-data policy.
#[derive(Debug, Clone, Default)]
pub struct ConditionInput {
    pub user: Option<UserEntry>,
    pub token_serial: Option<String>,
    pub container_serial: Option<String>,
    pub request: Option<RequestMetadata>,
    pub request_data: Option<HashMap<String, Value>>,
}

impl ConditionInput {
    /// Input with no data sources at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the acting user entry.
    pub fn with_user(mut self, user: UserEntry) -> Self {
        self.user = Some(user);
        self
    }

    /// Set the token serial.
    pub fn with_token_serial(mut self, serial: impl Into<String>) -> Self {
        self.token_serial = Some(serial.into());
        self
    }

    /// Set the container serial.
    pub fn with_container_serial(mut self, serial: impl Into<String>) -> Self {
        self.container_serial = Some(serial.into());
        self
    }

    /// Set the HTTP request metadata.
    pub fn with_request(mut self, request: RequestMetadata) -> Self {
        self.request = Some(request);
        self
    }

    /// Set the free-form request payload.
    pub fn with_request_data(mut self, data: HashMap<String, Value>) -> Self {
        self.request_data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_only_admin_and_user() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!("user".parse::<UserRole>().unwrap(), UserRole::User);
        assert!("superuser".parse::<UserRole>().is_err());
        assert!("Admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn identity_emptiness() {
        assert!(UserIdentity::default().is_empty());
        assert!(!UserIdentity::new("alice", "", "").is_empty());
        assert!(!UserIdentity::new("", "realm1", "").is_empty());
    }

    #[test]
    fn attributes_identity_defaults_absent_to_empty() {
        let attrs = UserAttributes {
            username: Some("alice".to_string()),
            ..Default::default()
        };
        assert_eq!(attrs.identity(), UserIdentity::new("alice", "", ""));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let meta = RequestMetadata::new().with_header("User-Agent", "curl");
        assert_eq!(meta.header("user-agent"), Some(&"curl".to_string()));
        assert_eq!(meta.header("USER-AGENT"), Some(&"curl".to_string()));
        assert!(meta.header("Host").is_none());
    }
}
