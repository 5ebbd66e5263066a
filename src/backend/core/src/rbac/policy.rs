//! Access evaluation.
//!
//! The evaluator answers one question: "may user U perform P in
//! organization O?" Each decision does exactly one membership lookup, then a
//! set-membership test against the role table.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::models::{MembershipStatus, OrganizationId, Role, UserId};
use super::permissions::Permission;
use super::resolver::{MembershipLookup, MembershipResolver};
use super::roles::RolePermissionTable;
use crate::config::AuthzConfig;
use crate::error::{AuthorizationError, Result};
use crate::store::{self, MembershipStore};
use crate::telemetry::metrics::record_decision;

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a request was denied. Logged, never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoMembership,
    Inactive(MembershipStatus),
    StoreUnavailable,
    NotGranted(Role),
}

impl DenyReason {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMembership => "no_membership",
            Self::Inactive(_) => "inactive",
            Self::StoreUnavailable => "store_unavailable",
            Self::NotGranted(_) => "not_granted",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMembership => f.write_str("no membership"),
            Self::Inactive(status) => write!(f, "membership is {}", status),
            Self::StoreUnavailable => f.write_str("membership store unavailable"),
            Self::NotGranted(role) => write!(f, "role {} lacks the permission", role),
        }
    }
}

/// Result of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(DenyReason),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Evaluator
// ═══════════════════════════════════════════════════════════════════════════════

/// Decides whether a user may perform an action within an organization.
///
/// Cheap to clone; share one per process. Like [`MembershipResolver`], it
/// must be driven by a Tokio runtime with the time driver enabled.
#[derive(Clone)]
pub struct AccessEvaluator {
    resolver: MembershipResolver,
    table: Arc<RolePermissionTable>,
}

impl AccessEvaluator {
    /// Evaluator over the built-in role table.
    pub fn new(store: Arc<dyn MembershipStore>) -> Result<Self> {
        Ok(Self {
            resolver: MembershipResolver::new(store),
            table: RolePermissionTable::shared_builtin()?,
        })
    }

    /// Evaluator over a custom role table. The table must pass
    /// [`RolePermissionTable::validate`].
    pub fn with_table(store: Arc<dyn MembershipStore>, table: RolePermissionTable) -> Result<Self> {
        table.validate()?;
        Ok(Self {
            resolver: MembershipResolver::new(store),
            table: Arc::new(table),
        })
    }

    /// Connect the configured store and build an evaluator over the built-in table.
    pub async fn from_config(config: &AuthzConfig) -> Result<Self> {
        let store = store::connect(&config.store).await?;
        Ok(Self::new(store)?.with_lookup_timeout(config.store.lookup_timeout))
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.resolver = self.resolver.with_lookup_timeout(timeout);
        self
    }

    pub fn resolver(&self) -> &MembershipResolver {
        &self.resolver
    }

    pub fn table(&self) -> &RolePermissionTable {
        &self.table
    }

    // ─── Decisions ──────────────────────────────────────────────────────────

    /// Full decision with the deny reason.
    #[instrument(skip(self), fields(user_id = %user_id, org_id = %org_id, permission = %permission))]
    pub async fn evaluate(
        &self,
        user_id: &UserId,
        org_id: &OrganizationId,
        permission: Permission,
    ) -> PolicyDecision {
        let decision = match self.resolver.lookup(user_id, org_id).await {
            MembershipLookup::Missing => PolicyDecision::Deny(DenyReason::NoMembership),
            MembershipLookup::Inactive(status) => {
                PolicyDecision::Deny(DenyReason::Inactive(status))
            }
            MembershipLookup::Unavailable => PolicyDecision::Deny(DenyReason::StoreUnavailable),
            MembershipLookup::Active(membership) => {
                if self.table.grants(membership.role, permission) {
                    PolicyDecision::Allow
                } else {
                    PolicyDecision::Deny(DenyReason::NotGranted(membership.role))
                }
            }
        };

        match decision {
            PolicyDecision::Allow => {
                debug!("Access allowed");
                record_decision("allow", "granted");
            }
            PolicyDecision::Deny(reason) => {
                debug!(reason = %reason, "Access denied");
                record_decision("deny", reason.as_str());
            }
        }

        decision
    }

    /// Whether the user may perform `permission` in `org_id`.
    pub async fn check(
        &self,
        user_id: &UserId,
        org_id: &OrganizationId,
        permission: Permission,
    ) -> bool {
        self.evaluate(user_id, org_id, permission).await.is_allowed()
    }

    /// Like [`check`](Self::check), but a denial is an error.
    pub async fn require(
        &self,
        user_id: &UserId,
        org_id: &OrganizationId,
        permission: Permission,
    ) -> std::result::Result<(), AuthorizationError> {
        if self.check(user_id, org_id, permission).await {
            Ok(())
        } else {
            Err(AuthorizationError::new(permission))
        }
    }

    // ─── Role predicates ────────────────────────────────────────────────────

    pub async fn is_owner(&self, user_id: &UserId, org_id: &OrganizationId) -> bool {
        self.resolver.role_of(user_id, org_id).await == Some(Role::Owner)
    }

    pub async fn is_admin_or_owner(&self, user_id: &UserId, org_id: &OrganizationId) -> bool {
        self.resolver
            .role_of(user_id, org_id)
            .await
            .is_some_and(|role| role.is_admin_or_owner())
    }
}

impl fmt::Debug for AccessEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessEvaluator")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
