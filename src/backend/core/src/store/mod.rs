//! Membership storage.
//!
//! The authorization core only reads memberships. Writes belong to the
//! membership management service; [`InMemoryMembershipStore::insert`] exists
//! for fixtures and local development.

mod memory;

pub use memory::InMemoryMembershipStore;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::db::PostgresMembershipStore;
use crate::error::{AuthzError, Result};
use crate::rbac::models::{Membership, OrganizationId, UserId};

/// Failures reported by a membership store.
///
/// None of these reach a caller of the evaluator; the resolver turns every
/// one of them into "no membership".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed membership record: {0}")]
    Malformed(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read access to organization memberships.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// The record binding `user_id` to `org_id`, if any.
    ///
    /// Looks up through the organization's member index. When several records
    /// exist for the pair, the store returns the first one.
    async fn find_membership(
        &self,
        org_id: &OrganizationId,
        user_id: &UserId,
    ) -> std::result::Result<Option<Membership>, StoreError>;

    /// Every record for `user_id`, whatever its status.
    async fn memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> std::result::Result<Vec<Membership>, StoreError>;
}

/// Build the configured store backend.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn MembershipStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory membership store");
            Ok(Arc::new(InMemoryMembershipStore::new()))
        }
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                AuthzError::configuration("store.database_url is required for the postgres backend")
            })?;
            let store = PostgresMembershipStore::connect(url, config.max_connections).await?;
            info!(max_connections = config.max_connections, "Connected to membership database");
            Ok(Arc::new(store))
        }
    }
}
