//! PostgreSQL membership store.
//!
//! Uses sqlx against the `memberships` table created by `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::{instrument, warn};

use crate::rbac::models::{Membership, MembershipId, OrganizationId, UserId};
use crate::store::{MembershipStore, StoreError};
use crate::telemetry::metrics::record_store_failure;

/// Membership store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PostgresMembershipStore {
    pool: PgPool,
}

impl PostgresMembershipStore {
    /// Create a new connection pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MembershipStore for PostgresMembershipStore {
    #[instrument(skip(self), fields(org_id = %org_id, user_id = %user_id))]
    async fn find_membership(
        &self,
        org_id: &OrganizationId,
        user_id: &UserId,
    ) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT membership_id, org_id, user_id, role, invited_by, invited_at, status
            FROM memberships
            WHERE org_id = $1 AND user_id = $2
            ORDER BY invited_at, membership_id
            LIMIT 1
            "#,
        )
        .bind(org_id.as_str())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Membership::try_from).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn memberships_for_user(&self, user_id: &UserId) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT membership_id, org_id, user_id, role, invited_by, invited_at, status
            FROM memberships
            WHERE user_id = $1
            ORDER BY invited_at
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(valid_memberships(rows))
    }
}

/// Convert rows, dropping and reporting any that do not parse.
fn valid_memberships(rows: Vec<MembershipRow>) -> Vec<Membership> {
    rows.into_iter()
        .filter_map(|row| match Membership::try_from(row) {
            Ok(membership) => Some(membership),
            Err(err) => {
                warn!(error = %err, "Skipping malformed membership row");
                record_store_failure("memberships_for_user", "malformed");
                None
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
pub struct MembershipRow {
    pub membership_id: String,
    pub org_id: String,
    pub user_id: String,
    pub role: String,
    pub invited_by: String,
    pub invited_at: DateTime<Utc>,
    pub status: String,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = StoreError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let malformed = |e: crate::error::AuthzError| {
            StoreError::Malformed(format!("membership {}: {}", row.membership_id, e))
        };

        Ok(Membership {
            membership_id: MembershipId::parse(row.membership_id.as_str()).map_err(malformed)?,
            org_id: OrganizationId::parse(row.org_id.as_str()).map_err(malformed)?,
            user_id: UserId::parse(row.user_id.as_str()).map_err(malformed)?,
            role: row.role.parse().map_err(malformed)?,
            invited_by: UserId::parse(row.invited_by.as_str()).map_err(malformed)?,
            invited_at: row.invited_at,
            status: row.status.parse().map_err(malformed)?,
        })
    }
}
