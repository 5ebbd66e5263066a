//! Membership resolution.
//!
//! Turns a `(user, organization)` pair into the caller's active membership.
//! Every failure mode collapses to "no membership": a store error or a slow
//! store can never grant access.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::models::{Membership, MembershipStatus, OrganizationId, Role, UserId};
use crate::store::{MembershipStore, StoreError};
use crate::telemetry::metrics::record_store_failure;

/// Default bound on a single store lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of one membership lookup, before fail-closed collapsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipLookup {
    Active(Membership),
    Inactive(MembershipStatus),
    Missing,
    /// The store failed or timed out.
    Unavailable,
}

impl MembershipLookup {
    /// The membership, only when it confers permissions.
    pub fn into_active(self) -> Option<Membership> {
        match self {
            Self::Active(membership) => Some(membership),
            _ => None,
        }
    }
}

/// Resolves active memberships through a [`MembershipStore`].
///
/// Lookups run under `tokio::time::timeout` and need a Tokio runtime with
/// the time driver enabled.
#[derive(Clone)]
pub struct MembershipResolver {
    store: Arc<dyn MembershipStore>,
    lookup_timeout: Duration,
}

impl MembershipResolver {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self {
            store,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Set the per-lookup timeout.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    /// Classify the caller's membership in `org_id`. Performs one store call.
    #[instrument(skip(self), fields(user_id = %user_id, org_id = %org_id))]
    pub async fn lookup(&self, user_id: &UserId, org_id: &OrganizationId) -> MembershipLookup {
        let result = tokio::time::timeout(
            self.lookup_timeout,
            self.store.find_membership(org_id, user_id),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout(self.lookup_timeout)));

        let record = match result {
            Ok(record) => record,
            Err(err) => {
                fail_closed("find_membership", &err);
                return MembershipLookup::Unavailable;
            }
        };

        match record {
            None => MembershipLookup::Missing,
            Some(m) if &m.org_id != org_id || &m.user_id != user_id => {
                let err = StoreError::Malformed(format!(
                    "record {} belongs to user={} org={}",
                    m.membership_id, m.user_id, m.org_id
                ));
                fail_closed("find_membership", &err);
                MembershipLookup::Unavailable
            }
            Some(m) if m.is_active() => MembershipLookup::Active(m),
            Some(m) => {
                debug!(status = %m.status, "Membership is not active");
                MembershipLookup::Inactive(m.status)
            }
        }
    }

    /// The caller's active membership in `org_id`, if any.
    pub async fn resolve(&self, user_id: &UserId, org_id: &OrganizationId) -> Option<Membership> {
        self.lookup(user_id, org_id).await.into_active()
    }

    /// The caller's role in `org_id`, if they are an active member.
    pub async fn role_of(&self, user_id: &UserId, org_id: &OrganizationId) -> Option<Role> {
        self.resolve(user_id, org_id).await.map(|m| m.role)
    }

    /// Every active membership of `user_id`. Empty when the store fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_organizations_for(&self, user_id: &UserId) -> Vec<Membership> {
        let result = tokio::time::timeout(
            self.lookup_timeout,
            self.store.memberships_for_user(user_id),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout(self.lookup_timeout)));

        match result {
            Ok(memberships) => memberships
                .into_iter()
                .filter(|m| &m.user_id == user_id && m.is_active())
                .collect(),
            Err(err) => {
                fail_closed("memberships_for_user", &err);
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for MembershipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipResolver")
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

fn fail_closed(operation: &'static str, err: &StoreError) {
    let kind = match err {
        StoreError::Unavailable(_) => "unavailable",
        StoreError::Timeout(_) => "timeout",
        StoreError::Malformed(_) => "malformed",
        StoreError::Database(_) => "database",
    };
    warn!(operation, kind, error = %err, "Membership lookup failed; treating as no membership");
    record_store_failure(operation, kind);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryMembershipStore, MockMembershipStore};
    use crate::telemetry::metrics::capture::CapturingRecorder;
    use crate::telemetry::metrics::STORE_FAILURES_TOTAL;

    fn org(id: &str) -> OrganizationId {
        OrganizationId::parse(id).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::parse(id).unwrap()
    }

    fn resolver_with(memberships: Vec<Membership>) -> MembershipResolver {
        MembershipResolver::new(Arc::new(InMemoryMembershipStore::with_memberships(memberships)))
    }

    #[tokio::test]
    async fn test_resolve_active() {
        let m = Membership::new(org("o1"), user("u1"), Role::Editor, user("admin"));
        let resolver = resolver_with(vec![m.clone()]);

        assert_eq!(resolver.resolve(&user("u1"), &org("o1")).await, Some(m));
        assert_eq!(resolver.role_of(&user("u1"), &org("o1")).await, Some(Role::Editor));
    }

    #[tokio::test]
    async fn test_inactive_is_absent() {
        let m = Membership::new(org("o1"), user("u1"), Role::Owner, user("admin"))
            .with_status(MembershipStatus::Removed);
        let resolver = resolver_with(vec![m]);

        assert_eq!(
            resolver.lookup(&user("u1"), &org("o1")).await,
            MembershipLookup::Inactive(MembershipStatus::Removed)
        );
        assert!(resolver.resolve(&user("u1"), &org("o1")).await.is_none());
        assert!(resolver.role_of(&user("u1"), &org("o1")).await.is_none());
    }

    #[tokio::test]
    async fn test_missing() {
        let resolver = resolver_with(vec![]);
        assert_eq!(
            resolver.lookup(&user("u1"), &org("o1")).await,
            MembershipLookup::Missing
        );
    }

    #[tokio::test]
    async fn test_store_error_is_absent() {
        let mut store = MockMembershipStore::new();
        store
            .expect_find_membership()
            .times(1)
            .returning(|_, _| Err(StoreError::Unavailable("connection refused".into())));

        let resolver = MembershipResolver::new(Arc::new(store));
        assert_eq!(
            resolver.lookup(&user("u1"), &org("o1")).await,
            MembershipLookup::Unavailable
        );
    }

    #[tokio::test]
    async fn test_mismatched_record_is_absent() {
        let mut store = MockMembershipStore::new();
        store.expect_find_membership().returning(|_, _| {
            Ok(Some(Membership::new(
                OrganizationId::parse("other-org").unwrap(),
                UserId::parse("u1").unwrap(),
                Role::Owner,
                UserId::parse("admin").unwrap(),
            )))
        });

        let resolver = MembershipResolver::new(Arc::new(store));
        assert!(resolver.resolve(&user("u1"), &org("o1")).await.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_inactive() {
        let resolver = resolver_with(vec![
            Membership::new(org("o1"), user("u1"), Role::Viewer, user("admin")),
            Membership::new(org("o2"), user("u1"), Role::Admin, user("admin"))
                .with_status(MembershipStatus::Removed),
            Membership::new(org("o3"), user("u1"), Role::Editor, user("admin"))
                .with_status(MembershipStatus::Invited),
        ]);

        let listed = resolver.list_organizations_for(&user("u1")).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].org_id, org("o1"));
    }

    #[tokio::test]
    async fn test_list_store_error_is_empty() {
        let mut store = MockMembershipStore::new();
        store
            .expect_memberships_for_user()
            .returning(|_| Err(StoreError::Unavailable("down".into())));

        let resolver = MembershipResolver::new(Arc::new(store));
        assert!(resolver.list_organizations_for(&user("u1")).await.is_empty());
    }

    struct SlowStore;

    #[async_trait::async_trait]
    impl MembershipStore for SlowStore {
        async fn find_membership(
            &self,
            _org_id: &OrganizationId,
            _user_id: &UserId,
        ) -> Result<Option<Membership>, StoreError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(None)
        }

        async fn memberships_for_user(&self, _user_id: &UserId) -> Result<Vec<Membership>, StoreError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_fail_closed_emits_failure_metric() {
        let recorder = CapturingRecorder::default();

        let mut broken = MockMembershipStore::new();
        broken
            .expect_find_membership()
            .returning(|_, _| Err(StoreError::Unavailable("down".into())));
        let mut foreign = MockMembershipStore::new();
        foreign.expect_find_membership().returning(|_, _| {
            Ok(Some(Membership::new(
                OrganizationId::parse("other-org").unwrap(),
                UserId::parse("u1").unwrap(),
                Role::Owner,
                UserId::parse("admin").unwrap(),
            )))
        });

        metrics::with_local_recorder(&recorder, || {
            tokio_test::block_on(async {
                let unavailable = MembershipResolver::new(Arc::new(broken));
                let slow = MembershipResolver::new(Arc::new(SlowStore))
                    .with_lookup_timeout(Duration::from_millis(10));
                let mismatched = MembershipResolver::new(Arc::new(foreign));

                assert!(unavailable.resolve(&user("u1"), &org("o1")).await.is_none());
                assert!(slow.resolve(&user("u1"), &org("o1")).await.is_none());
                assert!(slow.list_organizations_for(&user("u1")).await.is_empty());
                assert!(mismatched.resolve(&user("u1"), &org("o1")).await.is_none());
            });
        });

        let failures = |operation, kind| {
            recorder.count(STORE_FAILURES_TOTAL, &[("operation", operation), ("kind", kind)])
        };
        assert_eq!(failures("find_membership", "unavailable"), 1);
        assert_eq!(failures("find_membership", "timeout"), 1);
        assert_eq!(failures("memberships_for_user", "timeout"), 1);
        assert_eq!(failures("find_membership", "malformed"), 1);
        assert_eq!(recorder.total(STORE_FAILURES_TOTAL), 4);
    }

    #[test]
    fn test_healthy_lookups_emit_no_failure_metric() {
        let recorder = CapturingRecorder::default();
        let resolver = resolver_with(vec![Membership::new(
            org("o1"),
            user("u1"),
            Role::Viewer,
            user("admin"),
        )
        .with_status(MembershipStatus::Removed)]);

        metrics::with_local_recorder(&recorder, || {
            tokio_test::block_on(async {
                assert!(resolver.resolve(&user("u1"), &org("o1")).await.is_none());
                assert!(resolver.resolve(&user("u2"), &org("o1")).await.is_none());
            });
        });

        assert_eq!(recorder.total(STORE_FAILURES_TOTAL), 0);
    }

    #[test]
    fn test_default_timeout() {
        let resolver = resolver_with(vec![]);
        assert_eq!(resolver.lookup_timeout(), DEFAULT_LOOKUP_TIMEOUT);
        let resolver = resolver.with_lookup_timeout(Duration::from_millis(50));
        assert_eq!(resolver.lookup_timeout(), Duration::from_millis(50));
    }

    #[test]
    fn test_lookups_need_only_the_time_driver() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let resolver = resolver_with(vec![Membership::new(org("o1"), user("u1"), Role::Editor, user("admin"))]);
        let slow = MembershipResolver::new(Arc::new(SlowStore))
            .with_lookup_timeout(Duration::from_millis(10));

        runtime.block_on(async {
            let found = resolver.resolve(&user("u1"), &org("o1")).await;
            assert_eq!(found.map(|m| m.role), Some(Role::Editor));
            assert!(slow.resolve(&user("u1"), &org("o1")).await.is_none());
        });
    }
}
