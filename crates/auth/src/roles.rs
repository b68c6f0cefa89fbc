use serde::{Deserialize, Serialize};

use crate::{Permission, PermissionSet};

/// Role identifier used for RBAC.
///
/// Roles map to a fixed permission set; permissions are never granted to a
/// user directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    Member,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Manager, Role::Member, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Full system administrator with all permissions",
            Role::Manager => "Manages workspaces and their members",
            Role::Member => "Creates and edits workspaces they belong to",
            Role::Viewer => "Read-only access to workspaces they belong to",
        }
    }

    /// Admins act on every workspace; other roles only on workspaces they belong to.
    pub fn bypasses_membership(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn permissions(&self) -> PermissionSet {
        use Permission::*;

        match self {
            Role::Admin => PermissionSet::all(),
            Role::Manager => [
                WorkspacesCreate,
                WorkspacesRead,
                WorkspacesUpdate,
                WorkspacesDelete,
                WorkspacesRestore,
                WorkspacesManageUsers,
                WorkspacesHistory,
                UsersRead,
            ]
            .into_iter()
            .collect(),
            Role::Member => [WorkspacesCreate, WorkspacesRead, WorkspacesUpdate, WorkspacesHistory]
                .into_iter()
                .collect(),
            Role::Viewer => [WorkspacesRead].into_iter().collect(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}
