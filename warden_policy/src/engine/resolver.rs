//! Owner attribute resolution.
//!
//! Derives the normalized attribute set for the owner of a token or a
//! container. A lookup miss is a legitimate authorization state (an
//! unassigned token, a deleted container), so misses and store failures
//! degrade to an empty attribute set instead of failing the decision.

use std::sync::Arc;

use tracing::{debug, warn};

use warden_core::traits::{ContainerStore, TokenStore};
use warden_core::types::UserAttributes;

/// Resolves owner attributes through the token and container stores.
pub struct AttributeResolver {
    token_store: Arc<dyn TokenStore>,
    container_store: Arc<dyn ContainerStore>,
}

impl AttributeResolver {
    /// Create a new resolver.
    pub fn new(token_store: Arc<dyn TokenStore>, container_store: Arc<dyn ContainerStore>) -> Self {
        Self {
            token_store,
            container_store,
        }
    }

    /// The attribute set of a token's owner.
    ///
    /// Returns all-absent attributes when the serial is empty, the token
    /// is unknown, or the lookup fails. When the token resolves, its
    /// realm list is reported as `additional_realms` even if it has no
    /// owner.
    pub fn token_owner_attributes(&self, serial: &str) -> UserAttributes {
        if serial.is_empty() {
            return UserAttributes::default();
        }
        let token = match self.token_store.find_by_serial(serial) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!(serial, "token not found, using empty owner attributes");
                return UserAttributes::default();
            }
            Err(e) => {
                warn!(serial, error = %e, "token lookup failed, using empty owner attributes");
                return UserAttributes::default();
            }
        };

        let mut attributes = UserAttributes::default();
        if let Some(owner) = token.owner {
            attributes.username = Some(owner.username);
            attributes.realm = Some(owner.realm);
            attributes.resolver = Some(owner.resolver);
        }
        attributes.additional_realms = Some(token.realms);
        attributes
    }

    /// The attribute set of a container's owner.
    ///
    /// Containers nominally have one owner; if the data holds several,
    /// only the first listed owner is considered (documented limitation
    /// of the matching logic). The container's realm list is reported as
    /// `additional_realms`.
    pub fn container_owner_attributes(&self, serial: &str) -> UserAttributes {
        if serial.is_empty() {
            return UserAttributes::default();
        }
        let container = match self.container_store.find_by_serial(serial) {
            Ok(Some(container)) => container,
            Ok(None) => {
                debug!(serial, "container not found, using empty owner attributes");
                return UserAttributes::default();
            }
            Err(e) => {
                warn!(serial, error = %e, "container lookup failed, using empty owner attributes");
                return UserAttributes::default();
            }
        };

        let mut attributes = UserAttributes::default();
        if let Some(owner) = container.owners.first() {
            attributes.username = Some(owner.username.clone());
            attributes.realm = Some(owner.realm.clone());
            attributes.resolver = Some(owner.resolver.clone());
        }
        attributes.additional_realms = Some(container.realms);
        attributes
    }
}
