#![allow(clippy::result_large_err)]
//! # WellTrack Authorization Core
//!
//! Decides whether a user may perform an action within an organization.
//!
//! ## Architecture
//!
//! - **Permission Catalog**: closed set of `resource:verb` capabilities
//! - **Role Table**: OWNER, ADMIN, EDITOR, VIEWER and their grants
//! - **Membership Resolver**: one store lookup per decision, fail-closed
//! - **Access Evaluator**: `check`, `require`, `is_owner`, `is_admin_or_owner`
//! - **Stores**: in-memory and PostgreSQL membership stores
//! - **Middleware**: Axum layer guarding routes with a permission
//! - **Telemetry**: structured logging and decision metrics
//!
//! ## Runtime
//!
//! Store lookups are bounded with `tokio::time::timeout`, so resolver and
//! evaluator futures must be polled inside a Tokio runtime with the time
//! driver enabled (`#[tokio::main]`, or a builder with `enable_time()`).
//! Polling them from another executor panics.

pub mod config;
pub mod db;
pub mod error;
pub mod rbac;
pub mod store;
pub mod telemetry;

pub use error::{AuthorizationError, AuthzError, ErrorCode, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AuthzConfig, StoreBackend, StoreConfig};
    pub use crate::error::{AuthorizationError, AuthzError, ErrorCode, Result};
    pub use crate::rbac::{
        AccessEvaluator, DenyReason, Membership, MembershipId, MembershipResolver,
        MembershipStatus, OrganizationId, Permission, PolicyDecision, RbacContext,
        RequestPrincipal, RequirePermissionLayer, Role, RolePermissionTable, UserId,
    };
    pub use crate::store::{InMemoryMembershipStore, MembershipStore, StoreError};
}
