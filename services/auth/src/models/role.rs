//! Roles and the capabilities they carry
//!
//! Route guards and the access policy both ask `has_capability` instead of
//! comparing role strings, so the two cannot drift apart.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Account role stored on the user row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Creator,
    Moderator,
    Admin,
}

/// Something a role is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Work the moderation queue and resolve flags
    Moderate,
    /// Platform administration (roles, bans, settings)
    Administer,
    /// Upload new videos
    Upload,
    /// Read any video regardless of access mode, privacy or status
    BypassAccessPolicy,
    /// Treated as entitled without a paid membership
    ImplicitEntitlement,
    /// Edit metadata and access lists of videos owned by others
    ManageAnyVideo,
    /// Delete videos owned by others
    DeleteAnyVideo,
}

impl Role {
    /// Capability set granted to this role
    pub fn capabilities(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::User => &[Upload],
            Role::Creator => &[Upload, ImplicitEntitlement],
            Role::Moderator => &[
                Moderate,
                BypassAccessPolicy,
                ImplicitEntitlement,
                DeleteAnyVideo,
            ],
            Role::Admin => &[
                Moderate,
                Administer,
                Upload,
                BypassAccessPolicy,
                ImplicitEntitlement,
                ManageAnyVideo,
                DeleteAnyVideo,
            ],
        }
    }

    /// Whether the role carries `capability`
    pub fn has_capability(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Staff roles bypass most access checks
    pub fn is_staff(self) -> bool {
        self.has_capability(Capability::BypassAccessPolicy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Creator => "creator",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Parse a stored role, falling back to the least privileged role
    pub fn from_db(value: &str) -> Self {
        value.parse().unwrap_or(Role::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "creator" => Ok(Role::Creator),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_roles() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Moderator.is_staff());
        assert!(!Role::Creator.is_staff());
        assert!(!Role::User.is_staff());
    }

    #[test]
    fn test_moderators_cannot_upload() {
        assert!(!Role::Moderator.has_capability(Capability::Upload));
        assert!(Role::User.has_capability(Capability::Upload));
        assert!(Role::Creator.has_capability(Capability::Upload));
        assert!(Role::Admin.has_capability(Capability::Upload));
    }

    #[test]
    fn test_implicit_entitlement() {
        assert!(Role::Creator.has_capability(Capability::ImplicitEntitlement));
        assert!(!Role::User.has_capability(Capability::ImplicitEntitlement));
    }

    #[test]
    fn test_unknown_role_falls_back_to_user() {
        assert_eq!(Role::from_db("superuser"), Role::User);
        assert_eq!(Role::from_db("admin"), Role::Admin);
        assert!("Admin".parse::<Role>().is_err());
    }
}
