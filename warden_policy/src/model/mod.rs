//! Policy condition model.
//!
//! Defines the condition tuple, the closed set of data sections a
//! condition can read from, the missing-data behaviors, and the policy
//! definition consumed by the in-memory store.

mod condition;
mod policy;

pub use condition::{MissingDataPolicy, PolicyCondition, Section, SectionData};
pub use policy::PolicyDefinition;

/// Action names the arbiter treats specially.
pub mod actions {
    /// Assign a user to a token.
    pub const ASSIGN: &str = "assign";

    /// Create a new container.
    pub const CONTAINER_CREATE: &str = "container_create";

    /// Assign a user to a container.
    pub const CONTAINER_ASSIGN_USER: &str = "container_assign_user";

    /// Add a token to a container.
    pub const CONTAINER_ADD_TOKEN: &str = "container_add_token";

    /// Remove a token from a container.
    pub const CONTAINER_REMOVE_TOKEN: &str = "container_remove_token";
}
