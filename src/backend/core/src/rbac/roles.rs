//! Role-permission registry.
//!
//! WellTrack ships with four built-in organization roles:
//!
//! | Role    | Description                                                     |
//! |---------|-----------------------------------------------------------------|
//! | Owner   | Full access, including deleting the organization                |
//! | Admin   | Everything an owner can do except deleting the organization     |
//! | Editor  | View, create and edit projects, wells, stages, events; upload   |
//! | Viewer  | Read-only access                                                |
//!
//! Each grant list is written out in full so it can be reviewed on its own.
//! [`RolePermissionTable::validate`] checks that the lists still nest.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use super::models::Role;
use super::permissions::Permission;

static BUILTIN: OnceLock<Arc<RolePermissionTable>> = OnceLock::new();
static BUILTIN_CHECK: OnceLock<Result<(), TableError>> = OnceLock::new();

const OWNER_GRANTS: &[Permission] = &[
    Permission::OrgView,
    Permission::OrgEdit,
    Permission::OrgDelete,
    Permission::OrgManageMembers,
    Permission::ProjectView,
    Permission::ProjectCreate,
    Permission::ProjectEdit,
    Permission::ProjectDelete,
    Permission::WellView,
    Permission::WellCreate,
    Permission::WellEdit,
    Permission::WellDelete,
    Permission::StageView,
    Permission::StageCreate,
    Permission::StageEdit,
    Permission::StageDelete,
    Permission::EventView,
    Permission::EventCreate,
    Permission::EventEdit,
    Permission::EventDelete,
    Permission::FileView,
    Permission::FileUpload,
    Permission::FileDelete,
];

// Owner minus org:delete.
const ADMIN_GRANTS: &[Permission] = &[
    Permission::OrgView,
    Permission::OrgEdit,
    Permission::OrgManageMembers,
    Permission::ProjectView,
    Permission::ProjectCreate,
    Permission::ProjectEdit,
    Permission::ProjectDelete,
    Permission::WellView,
    Permission::WellCreate,
    Permission::WellEdit,
    Permission::WellDelete,
    Permission::StageView,
    Permission::StageCreate,
    Permission::StageEdit,
    Permission::StageDelete,
    Permission::EventView,
    Permission::EventCreate,
    Permission::EventEdit,
    Permission::EventDelete,
    Permission::FileView,
    Permission::FileUpload,
    Permission::FileDelete,
];

// No deletes, no organization administration.
const EDITOR_GRANTS: &[Permission] = &[
    Permission::OrgView,
    Permission::ProjectView,
    Permission::ProjectCreate,
    Permission::ProjectEdit,
    Permission::WellView,
    Permission::WellCreate,
    Permission::WellEdit,
    Permission::StageView,
    Permission::StageCreate,
    Permission::StageEdit,
    Permission::EventView,
    Permission::EventCreate,
    Permission::EventEdit,
    Permission::FileView,
    Permission::FileUpload,
];

const VIEWER_GRANTS: &[Permission] = &[
    Permission::OrgView,
    Permission::ProjectView,
    Permission::WellView,
    Permission::StageView,
    Permission::EventView,
    Permission::FileView,
];

/// Ways a role table can break the role hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("role {0} has no entry")]
    MissingRole(Role),

    #[error("{narrower} grants {permission} which {wider} does not")]
    NotMonotonic {
        narrower: Role,
        wider: Role,
        permission: Permission,
    },

    #[error("org:delete must be granted to OWNER only, found on {0}")]
    OrgDeleteMisassigned(Role),

    #[error("OWNER must be granted org:delete")]
    OwnerCannotDelete,
}

/// Immutable mapping from role to its permission set.
#[derive(Debug, Clone)]
pub struct RolePermissionTable {
    grants: HashMap<Role, HashSet<Permission>>,
    empty: HashSet<Permission>,
}

impl RolePermissionTable {
    /// Build a table from explicit grant lists. Not validated.
    pub fn new<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Role, &'a [Permission])>,
    {
        let grants = entries
            .into_iter()
            .map(|(role, perms)| (role, perms.iter().copied().collect()))
            .collect();
        Self {
            grants,
            empty: HashSet::new(),
        }
    }

    fn builtin_arc() -> &'static Arc<RolePermissionTable> {
        BUILTIN.get_or_init(|| {
            Arc::new(Self::new([
                (Role::Owner, OWNER_GRANTS),
                (Role::Admin, ADMIN_GRANTS),
                (Role::Editor, EDITOR_GRANTS),
                (Role::Viewer, VIEWER_GRANTS),
            ]))
        })
    }

    /// The process-wide built-in table.
    pub fn builtin() -> &'static RolePermissionTable {
        Self::builtin_arc()
    }

    /// Shared handle to the built-in table, validated on first use.
    pub fn shared_builtin() -> Result<Arc<RolePermissionTable>, TableError> {
        BUILTIN_CHECK
            .get_or_init(|| Self::builtin().validate())
            .clone()?;
        Ok(Arc::clone(Self::builtin_arc()))
    }

    /// Every permission granted to `role`.
    pub fn permissions_of(&self, role: Role) -> &HashSet<Permission> {
        self.grants.get(&role).unwrap_or(&self.empty)
    }

    /// Whether `role` is granted `permission`.
    pub fn grants(&self, role: Role, permission: Permission) -> bool {
        self.permissions_of(role).contains(&permission)
    }

    /// Check totality and that each role's grants nest inside the next wider role.
    pub fn validate(&self) -> Result<(), TableError> {
        for role in Role::ALL {
            if !self.grants.contains_key(&role) {
                return Err(TableError::MissingRole(role));
            }
        }

        // Role::ALL is ordered widest first, so compare neighbours.
        for pair in Role::ALL.windows(2) {
            let (wider, narrower) = (pair[0], pair[1]);
            let wider_set = self.permissions_of(wider);
            let mut extra: Vec<Permission> = self
                .permissions_of(narrower)
                .difference(wider_set)
                .copied()
                .collect();
            extra.sort();
            if let Some(permission) = extra.first() {
                return Err(TableError::NotMonotonic {
                    narrower,
                    wider,
                    permission: *permission,
                });
            }
        }

        if !self.grants(Role::Owner, Permission::OrgDelete) {
            return Err(TableError::OwnerCannotDelete);
        }
        if let Some(role) = Role::ALL
            .into_iter()
            .filter(|r| *r != Role::Owner)
            .find(|r| self.grants(*r, Permission::OrgDelete))
        {
            return Err(TableError::OrgDeleteMisassigned(role));
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> &'static RolePermissionTable {
        RolePermissionTable::builtin()
    }

    #[test]
    fn test_builtin_is_valid() {
        assert_eq!(table().validate(), Ok(()));
    }

    #[test]
    fn test_shared_builtin_is_one_table() {
        let a = RolePermissionTable::shared_builtin().unwrap();
        let b = RolePermissionTable::shared_builtin().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(std::ptr::eq(a.as_ref(), RolePermissionTable::builtin()));
    }

    #[test]
    fn test_totality() {
        for role in Role::ALL {
            assert!(!table().permissions_of(role).is_empty(), "{} has no grants", role);
        }
    }

    #[test]
    fn test_owner_has_everything() {
        let owner = table().permissions_of(Role::Owner);
        assert_eq!(owner.len(), Permission::ALL.len());
        assert!(Permission::ALL.iter().all(|p| owner.contains(p)));
    }

    #[test]
    fn test_admin_is_owner_minus_org_delete() {
        let owner = table().permissions_of(Role::Owner);
        let admin = table().permissions_of(Role::Admin);
        let diff: Vec<_> = owner.difference(admin).copied().collect();
        assert_eq!(diff, vec![Permission::OrgDelete]);
        assert!(admin.is_subset(owner));
    }

    #[test]
    fn test_chain_is_monotonic() {
        let viewer = table().permissions_of(Role::Viewer);
        let editor = table().permissions_of(Role::Editor);
        let admin = table().permissions_of(Role::Admin);
        assert!(viewer.is_subset(editor));
        assert!(editor.is_subset(admin));
    }

    #[test]
    fn test_editor_permissions() {
        assert!(table().grants(Role::Editor, Permission::WellEdit));
        assert!(table().grants(Role::Editor, Permission::FileUpload));
        assert!(!table().grants(Role::Editor, Permission::WellDelete));
        assert!(!table().grants(Role::Editor, Permission::ProjectDelete));
        assert!(!table().grants(Role::Editor, Permission::OrgManageMembers));
    }

    #[test]
    fn test_viewer_read_only() {
        for p in table().permissions_of(Role::Viewer) {
            assert_eq!(p.verb(), crate::rbac::permissions::Verb::View);
        }
        assert!(!table().grants(Role::Viewer, Permission::WellEdit));
    }

    #[test]
    fn test_validate_rejects_missing_role() {
        let t = RolePermissionTable::new([
            (Role::Owner, OWNER_GRANTS),
            (Role::Admin, ADMIN_GRANTS),
            (Role::Editor, EDITOR_GRANTS),
        ]);
        assert_eq!(t.validate(), Err(TableError::MissingRole(Role::Viewer)));
        assert!(t.permissions_of(Role::Viewer).is_empty());
    }

    #[test]
    fn test_validate_rejects_non_monotonic() {
        let viewer_with_delete = [Permission::OrgView, Permission::WellDelete];
        let t = RolePermissionTable::new([
            (Role::Owner, OWNER_GRANTS),
            (Role::Admin, ADMIN_GRANTS),
            (Role::Editor, EDITOR_GRANTS),
            (Role::Viewer, &viewer_with_delete[..]),
        ]);
        assert_eq!(
            t.validate(),
            Err(TableError::NotMonotonic {
                narrower: Role::Viewer,
                wider: Role::Editor,
                permission: Permission::WellDelete,
            })
        );
    }

    #[test]
    fn test_validate_rejects_admin_org_delete() {
        let t = RolePermissionTable::new([
            (Role::Owner, OWNER_GRANTS),
            (Role::Admin, OWNER_GRANTS),
            (Role::Editor, EDITOR_GRANTS),
            (Role::Viewer, VIEWER_GRANTS),
        ]);
        assert_eq!(t.validate(), Err(TableError::OrgDeleteMisassigned(Role::Admin)));
    }

    #[test]
    fn test_validate_rejects_owner_without_org_delete() {
        let t = RolePermissionTable::new([
            (Role::Owner, ADMIN_GRANTS),
            (Role::Admin, ADMIN_GRANTS),
            (Role::Editor, EDITOR_GRANTS),
            (Role::Viewer, VIEWER_GRANTS),
        ]);
        assert_eq!(t.validate(), Err(TableError::OwnerCannotDelete));
    }
}
