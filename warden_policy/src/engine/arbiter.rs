//! Authorization decisions for token and container actions.
//!
//! The arbiter derives the attribute set to match policies against,
//! applies the role-specific ownership gates, asks the policy store for
//! a decision, and runs the detach cascade for token moves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use warden_core::error::{ParameterError, Result};
use warden_core::traits::{ContainerStore, MatchQuery, PolicyMatcher, TokenStore};
use warden_core::types::{ConditionInput, UserAttributes, UserRole};

use crate::model::actions;

use super::resolver::AttributeResolver;

/// Check whether an actor is the owner of a resource.
///
/// Both sides are reduced to their (username, realm, resolver) identity
/// triple, with absent fields as empty strings. With `allow_no_owner`,
/// a resource that has no owner at all also passes.
pub fn is_owner(acting: &UserAttributes, owner: &UserAttributes, allow_no_owner: bool) -> bool {
    let actor = acting.identity();
    let owner = owner.identity();
    if actor == owner {
        return true;
    }
    allow_no_owner && owner.is_empty()
}

/// One recorded authorization decision.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    /// Unique decision ID.
    pub id: u64,

    /// Role of the actor.
    pub role: UserRole,

    /// The actor's login name (admin user or username).
    pub actor: String,

    /// Action that was requested.
    pub action: String,

    /// Serial of the targeted token or container.
    pub resource: String,

    /// Whether the action was allowed.
    pub allowed: bool,

    /// Additional details.
    pub details: String,

    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
}

/// In-memory log of recent authorization decisions.
#[derive(Debug, Default)]
pub struct DecisionAudit {
    entries: DashMap<u64, DecisionRecord>,
    next_id: AtomicU64,
}

impl DecisionAudit {
    fn record(
        &self,
        role: UserRole,
        acting: &UserAttributes,
        action: &str,
        resource: &str,
        allowed: bool,
        details: &str,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let actor = match role {
            UserRole::Admin => acting.admin_user.clone(),
            UserRole::User => acting.username.clone(),
        }
        .unwrap_or_default();
        self.entries.insert(
            id,
            DecisionRecord {
                id,
                role,
                actor,
                action: action.to_string(),
                resource: resource.to_string(),
                allowed,
                details: details.to_string(),
                timestamp: Utc::now(),
            },
        );
    }

    /// The most recent decisions, newest first.
    pub fn recent(&self, limit: usize) -> Vec<DecisionRecord> {
        let mut entries: Vec<DecisionRecord> =
            self.entries.iter().map(|entry| entry.value().clone()).collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        entries.truncate(limit);
        entries
    }
}

/// The top-level decision function for token and container actions.
///
/// Stateless beyond its decision log; safe to share across request
/// handlers. Every decision reads the current owner/realm state fresh,
/// so concurrent decisions may observe different snapshots.
pub struct AuthorizationArbiter {
    resolver: AttributeResolver,
    policies: Arc<dyn PolicyMatcher>,
    container_store: Arc<dyn ContainerStore>,
    audit: DecisionAudit,
}

impl AuthorizationArbiter {
    /// Create a new arbiter.
    pub fn new(
        token_store: Arc<dyn TokenStore>,
        container_store: Arc<dyn ContainerStore>,
        policies: Arc<dyn PolicyMatcher>,
    ) -> Self {
        Self {
            resolver: AttributeResolver::new(token_store, container_store.clone()),
            policies,
            container_store,
            audit: DecisionAudit::default(),
        }
    }

    /// The resolver used for owner attributes.
    pub fn resolver(&self) -> &AttributeResolver {
        &self.resolver
    }

    /// The decision log.
    pub fn audit(&self) -> &DecisionAudit {
        &self.audit
    }

    /// Decide whether the actor may perform a token action.
    ///
    /// For administrators the policy match runs against the token
    /// owner's attributes: for `assign` absent owner fields stay absent
    /// (a policy scoped to "no owner yet" must still apply), for every
    /// other action they become empty strings (a generic policy without
    /// user filters must still match an ownerless token). End users must
    /// own the token for the container attach/detach actions.
    ///
    /// Moving a token into a container additionally requires permission
    /// to remove it from the container it currently sits in; that
    /// cascade check runs with the original, unrewritten actor
    /// attributes.
    pub fn is_token_action_allowed(
        &self,
        acting: &UserAttributes,
        action: &str,
        serial: &str,
    ) -> Result<bool> {
        let role = acting.role.ok_or(ParameterError::MissingRole)?;
        let owner = self.resolver.token_owner_attributes(serial);

        let input = token_input(serial);
        let mut allowed = match role {
            UserRole::Admin => {
                let attrs = if action == actions::ASSIGN {
                    rewrite_owner_or_absent(acting, &owner)
                } else {
                    rewrite_owner_or_empty(acting, &owner)
                };
                self.match_policies(role, action, &attrs, input)?
            }
            UserRole::User => {
                let attach_or_detach = action == actions::CONTAINER_ADD_TOKEN
                    || action == actions::CONTAINER_REMOVE_TOKEN;
                if !serial.is_empty() && attach_or_detach && !is_owner(acting, &owner, false) {
                    debug!(serial, action, "actor does not own the token");
                    self.audit
                        .record(role, acting, action, serial, false, "actor does not own the token");
                    return Ok(false);
                }
                self.match_policies(role, action, acting, input)?
            }
        };

        // Moving a token implies detaching it from its current container.
        if allowed && action == actions::CONTAINER_ADD_TOKEN && !serial.is_empty() {
            if let Some(container) = self.container_store.find_for_token(serial)? {
                allowed = self.is_container_action_allowed(
                    acting,
                    actions::CONTAINER_REMOVE_TOKEN,
                    &container.serial,
                )?;
                if !allowed {
                    debug!(
                        serial,
                        container = %container.serial,
                        "token move denied: not allowed to remove the token from its container"
                    );
                }
            }
        }

        self.audit
            .record(role, acting, action, serial, allowed, "policy match");
        Ok(allowed)
    }

    /// Decide whether the actor may perform a container action.
    ///
    /// Mirrors the token decision: `container_assign_user` keeps absent
    /// owner fields absent, `container_create` matches against the
    /// actor's own attributes (there is no owner yet), everything else
    /// uses owner-or-empty. End users must own the container, except for
    /// `container_create` (nothing to own yet) and
    /// `container_assign_user` (an ownerless container may be claimed).
    pub fn is_container_action_allowed(
        &self,
        acting: &UserAttributes,
        action: &str,
        container_serial: &str,
    ) -> Result<bool> {
        let role = acting.role.ok_or(ParameterError::MissingRole)?;
        let owner = self.resolver.container_owner_attributes(container_serial);

        let input = container_input(container_serial);
        let allowed = match role {
            UserRole::Admin => {
                let attrs = if action == actions::CONTAINER_ASSIGN_USER {
                    rewrite_owner_or_absent(acting, &owner)
                } else if action == actions::CONTAINER_CREATE {
                    rewrite_self_or_empty(acting)
                } else {
                    rewrite_owner_or_empty(acting, &owner)
                };
                self.match_policies(role, action, &attrs, input)?
            }
            UserRole::User => {
                let owns = if action == actions::CONTAINER_CREATE {
                    true
                } else if action == actions::CONTAINER_ASSIGN_USER {
                    is_owner(acting, &owner, true)
                } else {
                    is_owner(acting, &owner, false)
                };
                if !owns {
                    debug!(container_serial, action, "actor does not own the container");
                    self.audit.record(
                        role,
                        acting,
                        action,
                        container_serial,
                        false,
                        "actor does not own the container",
                    );
                    return Ok(false);
                }
                self.match_policies(role, action, acting, input)?
            }
        };

        self.audit
            .record(role, acting, action, container_serial, allowed, "policy match");
        Ok(allowed)
    }

    fn match_policies(
        &self,
        role: UserRole,
        action: &str,
        attrs: &UserAttributes,
        input: ConditionInput,
    ) -> Result<bool> {
        let query = MatchQuery {
            scope: Some(role),
            action: action.to_string(),
            username: attrs.username.clone(),
            resolver: attrs.resolver.clone(),
            realm: attrs.realm.clone(),
            admin_realm: attrs.admin_realm.clone(),
            admin_user: attrs.admin_user.clone(),
            additional_realms: attrs.additional_realms.clone(),
            input,
        };
        self.policies.match_generic(&query)
    }
}

fn token_input(serial: &str) -> ConditionInput {
    if serial.is_empty() {
        ConditionInput::new()
    } else {
        ConditionInput::new().with_token_serial(serial)
    }
}

fn container_input(serial: &str) -> ConditionInput {
    if serial.is_empty() {
        ConditionInput::new()
    } else {
        ConditionInput::new().with_container_serial(serial)
    }
}

/// Owner attributes win; absent owner fields stay absent, so policies
/// scoped to "no owner yet" keep matching.
fn rewrite_owner_or_absent(acting: &UserAttributes, owner: &UserAttributes) -> UserAttributes {
    let mut attrs = acting.clone();
    attrs.username = owner.username.clone();
    attrs.realm = owner.realm.clone();
    attrs.resolver = owner.resolver.clone();
    attrs.additional_realms = owner.additional_realms.clone();
    attrs
}

/// Owner attributes win; absent owner fields become empty strings, so
/// only policies without user filters match an ownerless resource.
fn rewrite_owner_or_empty(acting: &UserAttributes, owner: &UserAttributes) -> UserAttributes {
    let mut attrs = acting.clone();
    attrs.username = Some(owner.username.clone().unwrap_or_default());
    attrs.realm = Some(owner.realm.clone().unwrap_or_default());
    attrs.resolver = Some(owner.resolver.clone().unwrap_or_default());
    attrs.additional_realms = owner.additional_realms.clone();
    attrs
}

/// The actor's own user fields, absent ones as empty strings. Used for
/// container creation, where no owner exists yet.
fn rewrite_self_or_empty(acting: &UserAttributes) -> UserAttributes {
    let mut attrs = acting.clone();
    attrs.username = Some(acting.username.clone().unwrap_or_default());
    attrs.realm = Some(acting.realm.clone().unwrap_or_default());
    attrs.resolver = Some(acting.resolver.clone().unwrap_or_default());
    attrs.additional_realms = None;
    attrs
}
