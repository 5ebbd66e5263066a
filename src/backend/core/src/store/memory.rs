use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{MembershipStore, StoreError};
use crate::rbac::models::{Membership, MembershipId, OrganizationId, UserId};

/// Concurrent in-process membership store.
///
/// Records are kept per organization, in insertion order, with a secondary
/// index from user to the organizations they belong to. The index counts
/// records per (user, organization) pair, so concurrent inserts and removes
/// commute and it never loses an organization the user still has a record in.
/// Users with no records left are dropped from the index.
#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    by_org: DashMap<OrganizationId, Vec<Membership>>,
    orgs_by_user: DashMap<UserId, HashMap<OrganizationId, usize>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `memberships`.
    pub fn with_memberships(memberships: impl IntoIterator<Item = Membership>) -> Self {
        let store = Self::new();
        for membership in memberships {
            store.insert(membership);
        }
        store
    }

    pub fn insert(&self, membership: Membership) {
        // Index first: a reader may see the org before the record, never the reverse.
        *self
            .orgs_by_user
            .entry(membership.user_id.clone())
            .or_default()
            .entry(membership.org_id.clone())
            .or_insert(0) += 1;

        self.by_org
            .entry(membership.org_id.clone())
            .or_default()
            .push(membership);
    }

    /// Remove a record by id. Returns the removed record.
    pub fn remove(&self, membership_id: &MembershipId) -> Option<Membership> {
        let mut removed = None;
        for mut members in self.by_org.iter_mut() {
            if let Some(pos) = members.iter().position(|m| &m.membership_id == membership_id) {
                removed = Some(members.remove(pos));
                break;
            }
        }
        let removed = removed?;
        self.unindex(&removed.user_id, &removed.org_id);
        Some(removed)
    }

    fn unindex(&self, user_id: &UserId, org_id: &OrganizationId) {
        if let Some(mut orgs) = self.orgs_by_user.get_mut(user_id) {
            if let Some(count) = orgs.get_mut(org_id) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    orgs.remove(org_id);
                }
            }
        }
        // The guard above must be released before touching the same shard again.
        self.orgs_by_user.remove_if(user_id, |_, orgs| orgs.is_empty());
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.by_org.iter().map(|members| members.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn find_membership(
        &self,
        org_id: &OrganizationId,
        user_id: &UserId,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self.by_org.get(org_id).and_then(|members| {
            members.iter().find(|m| &m.user_id == user_id).cloned()
        }))
    }

    async fn memberships_for_user(&self, user_id: &UserId) -> Result<Vec<Membership>, StoreError> {
        let orgs = match self.orgs_by_user.get(user_id) {
            Some(orgs) => orgs.keys().cloned().collect::<Vec<_>>(),
            None => return Ok(Vec::new()),
        };

        let mut found = Vec::new();
        for org_id in orgs {
            if let Some(members) = self.by_org.get(&org_id) {
                found.extend(members.iter().filter(|m| &m.user_id == user_id).cloned());
            }
        }
        Ok(found)
    }
}
