//! # Warden Policy
//!
//! `warden_policy` decides whether an actor (an administrator or an end
//! user) may perform an action on an authentication token or a token
//! container.
//!
//! Key concepts:
//!
//! 1. **Policy Condition**: a single attribute test `(section, key,
//!    comparator, value)` gating whether a policy applies to a request.
//!
//! 2. **Section**: the category of data a condition reads from (user
//!    info, token, container, HTTP header/environment, request payload).
//!
//! 3. **Missing-Data Policy**: the configured behavior when a condition
//!    references data that does not exist (raise an error, treat the
//!    condition as satisfied, or treat it as failed).
//!
//! 4. **Authorization Arbiter**: the top-level decision function that
//!    combines the actor's attributes with the resource owner's and asks
//!    the policy store whether the action is granted.

pub mod compare;
pub mod engine;
pub mod model;
pub mod store;

// Re-export key types for convenience
pub use compare::{standard_comparators, StandardComparators};
pub use engine::{
    is_owner, AttributeResolver, AuthorizationArbiter, ConditionEvaluator, DecisionAudit,
    DecisionRecord,
};
pub use model::{actions, MissingDataPolicy, PolicyCondition, PolicyDefinition, Section, SectionData};
pub use store::{InMemoryContainerStore, InMemoryPolicyStore, InMemoryTokenStore};
