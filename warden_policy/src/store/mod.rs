//! Store implementations.
//!
//! In-memory reference implementations of the collaborator traits. They
//! back the test suite and small deployments; production callers are
//! expected to implement the `warden_core` traits over their own
//! persistence layer.

mod in_memory;
mod policy;

pub use in_memory::{InMemoryContainerStore, InMemoryTokenStore};
pub use policy::InMemoryPolicyStore;
