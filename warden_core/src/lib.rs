//! Warden Core - shared foundation for the Warden authorization engine.
//!
//! This crate defines the error hierarchy, the domain types exchanged
//! between the engine and its callers, and the trait seams through which
//! the engine reaches its collaborators (token store, container store,
//! policy store, comparator registry).

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, ParameterError, PolicyError, Result};
pub use traits::{ComparatorRegistry, ContainerStore, MatchQuery, PolicyMatcher, TokenStore};
pub use types::{
    ConditionInput, ContainerRecord, RequestMetadata, TokenRecord, UserAttributes, UserEntry,
    UserIdentity, UserRole,
};
