//! In-memory token and container stores.

use dashmap::DashMap;

use warden_core::error::Result;
use warden_core::traits::{ContainerStore, TokenStore};
use warden_core::types::{ContainerRecord, TokenRecord};

/// An in-memory token store, keyed by serial.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: DashMap<String, TokenRecord>,
}

impl InMemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a token.
    pub fn add(&self, token: TokenRecord) {
        self.tokens.insert(token.serial.clone(), token);
    }

    /// Remove a token.
    pub fn remove(&self, serial: &str) -> Option<TokenRecord> {
        self.tokens.remove(serial).map(|(_, token)| token)
    }
}

impl TokenStore for InMemoryTokenStore {
    fn find_by_serial(&self, serial: &str) -> Result<Option<TokenRecord>> {
        Ok(self.tokens.get(serial).map(|entry| entry.value().clone()))
    }
}

/// An in-memory container store, keyed by serial.
///
/// `find_for_token` is derived from the `container_serial` recorded on
/// the tokens registered via [`track_token`](Self::track_token).
#[derive(Debug, Default)]
pub struct InMemoryContainerStore {
    containers: DashMap<String, ContainerRecord>,

    /// token serial -> container serial
    memberships: DashMap<String, String>,
}

impl InMemoryContainerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a container.
    pub fn add(&self, container: ContainerRecord) {
        self.containers.insert(container.serial.clone(), container);
    }

    /// Record that a token currently sits in a container.
    pub fn track_token(&self, token_serial: impl Into<String>, container_serial: impl Into<String>) {
        self.memberships.insert(token_serial.into(), container_serial.into());
    }

    /// Remove a container and any memberships pointing at it.
    pub fn remove(&self, serial: &str) -> Option<ContainerRecord> {
        self.memberships.retain(|_, container| container != serial);
        self.containers.remove(serial).map(|(_, container)| container)
    }
}

impl ContainerStore for InMemoryContainerStore {
    fn find_by_serial(&self, serial: &str) -> Result<Option<ContainerRecord>> {
        Ok(self.containers.get(serial).map(|entry| entry.value().clone()))
    }

    fn find_for_token(&self, token_serial: &str) -> Result<Option<ContainerRecord>> {
        match self.memberships.get(token_serial) {
            Some(container_serial) => self.find_by_serial(container_serial.value()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::types::UserIdentity;

    #[test]
    fn token_lookup() {
        let store = InMemoryTokenStore::new();
        store.add(
            TokenRecord::new("OTP0001")
                .with_owner(UserIdentity::new("alice", "realm1", "resolver1")),
        );

        let token = store.find_by_serial("OTP0001").unwrap().unwrap();
        assert_eq!(token.owner.unwrap().username, "alice");
        assert!(store.find_by_serial("OTP9999").unwrap().is_none());
    }

    #[test]
    fn container_membership_lookup() {
        let store = InMemoryContainerStore::new();
        store.add(ContainerRecord::new("CONT01"));
        store.track_token("OTP0001", "CONT01");

        let container = store.find_for_token("OTP0001").unwrap().unwrap();
        assert_eq!(container.serial, "CONT01");
        assert!(store.find_for_token("OTP0002").unwrap().is_none());

        store.remove("CONT01");
        assert!(store.find_for_token("OTP0001").unwrap().is_none());
    }
}
