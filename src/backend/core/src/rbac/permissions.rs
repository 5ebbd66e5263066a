//! Permission catalog.
//!
//! The closed set of capabilities, each identified by `resource:verb`
//! (for example `well:edit`). Identifiers are persisted in logs and
//! downstream audit records, so renaming one is a breaking change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthzError;

/// Resource kinds that carry permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Organization,
    Project,
    Well,
    Stage,
    Event,
    File,
}

impl ResourceKind {
    /// Namespace prefix used in permission identifiers.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Organization => "org",
            Self::Project => "project",
            Self::Well => "well",
            Self::Stage => "stage",
            Self::Event => "event",
            Self::File => "file",
        }
    }
}

/// Verbs a permission can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    View,
    Create,
    Edit,
    Delete,
    Upload,
    ManageMembers,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Upload => "upload",
            Self::ManageMembers => "manage_members",
        }
    }
}

/// A single capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    OrgView,
    OrgEdit,
    OrgDelete,
    OrgManageMembers,

    ProjectView,
    ProjectCreate,
    ProjectEdit,
    ProjectDelete,

    WellView,
    WellCreate,
    WellEdit,
    WellDelete,

    StageView,
    StageCreate,
    StageEdit,
    StageDelete,

    EventView,
    EventCreate,
    EventEdit,
    EventDelete,

    FileView,
    FileUpload,
    FileDelete,
}

impl Permission {
    /// The full catalog.
    pub const ALL: [Permission; 23] = [
        Self::OrgView,
        Self::OrgEdit,
        Self::OrgDelete,
        Self::OrgManageMembers,
        Self::ProjectView,
        Self::ProjectCreate,
        Self::ProjectEdit,
        Self::ProjectDelete,
        Self::WellView,
        Self::WellCreate,
        Self::WellEdit,
        Self::WellDelete,
        Self::StageView,
        Self::StageCreate,
        Self::StageEdit,
        Self::StageDelete,
        Self::EventView,
        Self::EventCreate,
        Self::EventEdit,
        Self::EventDelete,
        Self::FileView,
        Self::FileUpload,
        Self::FileDelete,
    ];

    /// Stable identifier, e.g. `"well:edit"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrgView => "org:view",
            Self::OrgEdit => "org:edit",
            Self::OrgDelete => "org:delete",
            Self::OrgManageMembers => "org:manage_members",
            Self::ProjectView => "project:view",
            Self::ProjectCreate => "project:create",
            Self::ProjectEdit => "project:edit",
            Self::ProjectDelete => "project:delete",
            Self::WellView => "well:view",
            Self::WellCreate => "well:create",
            Self::WellEdit => "well:edit",
            Self::WellDelete => "well:delete",
            Self::StageView => "stage:view",
            Self::StageCreate => "stage:create",
            Self::StageEdit => "stage:edit",
            Self::StageDelete => "stage:delete",
            Self::EventView => "event:view",
            Self::EventCreate => "event:create",
            Self::EventEdit => "event:edit",
            Self::EventDelete => "event:delete",
            Self::FileView => "file:view",
            Self::FileUpload => "file:upload",
            Self::FileDelete => "file:delete",
        }
    }

    pub fn resource(&self) -> ResourceKind {
        match self {
            Self::OrgView | Self::OrgEdit | Self::OrgDelete | Self::OrgManageMembers => {
                ResourceKind::Organization
            }
            Self::ProjectView | Self::ProjectCreate | Self::ProjectEdit | Self::ProjectDelete => {
                ResourceKind::Project
            }
            Self::WellView | Self::WellCreate | Self::WellEdit | Self::WellDelete => {
                ResourceKind::Well
            }
            Self::StageView | Self::StageCreate | Self::StageEdit | Self::StageDelete => {
                ResourceKind::Stage
            }
            Self::EventView | Self::EventCreate | Self::EventEdit | Self::EventDelete => {
                ResourceKind::Event
            }
            Self::FileView | Self::FileUpload | Self::FileDelete => ResourceKind::File,
        }
    }

    pub fn verb(&self) -> Verb {
        match self {
            Self::OrgView
            | Self::ProjectView
            | Self::WellView
            | Self::StageView
            | Self::EventView
            | Self::FileView => Verb::View,
            Self::ProjectCreate | Self::WellCreate | Self::StageCreate | Self::EventCreate => {
                Verb::Create
            }
            Self::OrgEdit
            | Self::ProjectEdit
            | Self::WellEdit
            | Self::StageEdit
            | Self::EventEdit => Verb::Edit,
            Self::OrgDelete
            | Self::ProjectDelete
            | Self::WellDelete
            | Self::StageDelete
            | Self::EventDelete
            | Self::FileDelete => Verb::Delete,
            Self::FileUpload => Verb::Upload,
            Self::OrgManageMembers => Verb::ManageMembers,
        }
    }

    /// All permissions on one resource kind.
    pub fn for_resource(kind: ResourceKind) -> impl Iterator<Item = Permission> {
        Self::ALL.into_iter().filter(move |p| p.resource() == kind)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AuthzError;

    /// Exact match against the catalog; anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AuthzError::unknown_value("permission", s))
    }
}

impl TryFrom<String> for Permission {
    type Error = AuthzError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identifiers_unique() {
        let ids: HashSet<&str> = Permission::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(ids.len(), Permission::ALL.len());
    }

    #[test]
    fn test_identifier_matches_resource_and_verb() {
        for p in Permission::ALL {
            let expected = format!("{}:{}", p.resource().prefix(), p.verb().as_str());
            assert_eq!(p.as_str(), expected);
        }
    }

    #[test]
    fn test_parse_known() {
        assert_eq!("well:edit".parse::<Permission>().unwrap(), Permission::WellEdit);
        assert_eq!(
            "org:manage_members".parse::<Permission>().unwrap(),
            Permission::OrgManageMembers
        );
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>().unwrap(), p);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_and_partial() {
        assert!("well:fly".parse::<Permission>().is_err());
        assert!("edit".parse::<Permission>().is_err());
        assert!("WELL:EDIT".parse::<Permission>().is_err());
        assert!("file:create".parse::<Permission>().is_err());
        assert!("".parse::<Permission>().is_err());
    }

    #[test]
    fn test_serde_uses_identifier() {
        let json = serde_json::to_string(&Permission::StageDelete).unwrap();
        assert_eq!(json, "\"stage:delete\"");
        let p: Permission = serde_json::from_str("\"file:upload\"").unwrap();
        assert_eq!(p, Permission::FileUpload);
        assert!(serde_json::from_str::<Permission>("\"file:rename\"").is_err());
    }

    #[test]
    fn test_catalog_shape() {
        assert_eq!(Permission::for_resource(ResourceKind::Organization).count(), 4);
        assert_eq!(Permission::for_resource(ResourceKind::Well).count(), 4);
        assert_eq!(Permission::for_resource(ResourceKind::File).count(), 3);
        assert!(Permission::for_resource(ResourceKind::File).all(|p| p.verb() != Verb::Create));
    }
}
