//! RBAC data models: identifiers, roles, and organization memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthzError;

/// Upper bound on identifier length, in characters.
pub const MAX_IDENTIFIER_LEN: usize = 128;

fn validate_identifier(kind: &'static str, value: &str) -> Result<(), AuthzError> {
    if value.is_empty() {
        return Err(AuthzError::invalid_identifier(kind, "must not be empty"));
    }
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(AuthzError::invalid_identifier(
            kind,
            format!("must be at most {} characters", MAX_IDENTIFIER_LEN),
        ));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AuthzError::invalid_identifier(
            kind,
            "must not contain whitespace or control characters",
        ));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a raw identifier.
            pub fn parse(id: impl Into<String>) -> Result<Self, AuthzError> {
                let id = id.into();
                validate_identifier($kind, &id)?;
                Ok(Self(id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = AuthzError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = AuthzError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = AuthzError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

identifier!(
    /// Strongly-typed user identifier.
    UserId,
    "user_id"
);

identifier!(
    /// Strongly-typed organization identifier.
    OrganizationId,
    "organization_id"
);

identifier!(
    /// Strongly-typed membership identifier.
    MembershipId,
    "membership_id"
);

impl MembershipId {
    /// Generate a fresh random membership identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role
// ═══════════════════════════════════════════════════════════════════════════════

/// Organization role.
///
/// Capability scope narrows from `Owner` to `Viewer`. `Admin` holds every
/// owner permission except deleting the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Admin,
    Editor,
    Viewer,
}

impl Role {
    /// Every role, widest scope first.
    pub const ALL: [Role; 4] = [Role::Owner, Role::Admin, Role::Editor, Role::Viewer];

    /// Wire form, e.g. `"OWNER"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Admin => "ADMIN",
            Self::Editor => "EDITOR",
            Self::Viewer => "VIEWER",
        }
    }

    /// Owner and admin roles can administer the organization.
    pub fn is_admin_or_owner(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| AuthzError::unknown_value("role", s))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Membership
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Active,
    Invited,
    Removed,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Invited => "INVITED",
            Self::Removed => "REMOVED",
        }
    }

    /// Only active memberships confer permissions.
    pub fn is_active(&self) -> bool {
        *self == Self::Active
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INVITED" => Ok(Self::Invited),
            "REMOVED" => Ok(Self::Removed),
            other => Err(AuthzError::unknown_value("membership status", other)),
        }
    }
}

/// Binding between one user and one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub membership_id: MembershipId,
    pub org_id: OrganizationId,
    pub user_id: UserId,
    pub role: Role,
    pub invited_by: UserId,
    pub invited_at: DateTime<Utc>,
    pub status: MembershipStatus,
}

impl Membership {
    /// Create an active membership with a generated id.
    pub fn new(org_id: OrganizationId, user_id: UserId, role: Role, invited_by: UserId) -> Self {
        Self {
            membership_id: MembershipId::generate(),
            org_id,
            user_id,
            role,
            invited_by,
            invited_at: Utc::now(),
            status: MembershipStatus::Active,
        }
    }

    /// Override the status.
    pub fn with_status(mut self, status: MembershipStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
