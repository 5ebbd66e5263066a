//! Role-based access control for WellTrack organizations.
//!
//! This module provides:
//! - **Permissions**: the closed catalog of `resource:verb` capabilities
//! - **Roles**: the role-permission table and its hierarchy check
//! - **Resolver**: fail-closed lookup of a caller's active membership
//! - **Policy**: the access evaluator (`check`, `require`, role predicates)
//! - **Middleware**: an Axum layer enforcing one permission per route
//!
//! # Usage
//!
//! ```rust,ignore
//! use welltrack_authz::rbac::{AccessEvaluator, Permission};
//!
//! let evaluator = AccessEvaluator::new(store)?;
//!
//! if evaluator.check(&user_id, &org_id, Permission::WellEdit).await {
//!     // ...
//! }
//!
//! evaluator.require(&user_id, &org_id, Permission::OrgDelete).await?;
//! ```

pub mod middleware;
pub mod models;
pub mod permissions;
pub mod policy;
pub mod resolver;
pub mod roles;

pub use middleware::{RbacContext, RequestPrincipal, RequirePermissionLayer, RequirePermissionService};
pub use models::{Membership, MembershipId, MembershipStatus, OrganizationId, Role, UserId};
pub use permissions::{Permission, ResourceKind, Verb};
pub use policy::{AccessEvaluator, DenyReason, PolicyDecision};
pub use resolver::{MembershipLookup, MembershipResolver};
pub use roles::{RolePermissionTable, TableError};
