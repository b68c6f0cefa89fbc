use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are a closed set of `{entity}.{action}` codes. Both the server
/// guards and the client-side UI gating link this enum, so the set cannot
/// drift between tiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "workspaces.create")]
    WorkspacesCreate,
    #[serde(rename = "workspaces.read")]
    WorkspacesRead,
    #[serde(rename = "workspaces.update")]
    WorkspacesUpdate,
    #[serde(rename = "workspaces.delete")]
    WorkspacesDelete,
    #[serde(rename = "workspaces.restore")]
    WorkspacesRestore,
    #[serde(rename = "workspaces.purge")]
    WorkspacesPurge,
    #[serde(rename = "workspaces.manage_users")]
    WorkspacesManageUsers,
    #[serde(rename = "workspaces.history")]
    WorkspacesHistory,
    #[serde(rename = "users.create")]
    UsersCreate,
    #[serde(rename = "users.read")]
    UsersRead,
    #[serde(rename = "users.update")]
    UsersUpdate,
    #[serde(rename = "users.delete")]
    UsersDelete,
}

/// Every permission known to the system.
pub const PERMISSIONS: [Permission; 12] = Permission::ALL;

impl Permission {
    pub const ALL: [Permission; 12] = [
        Permission::WorkspacesCreate,
        Permission::WorkspacesRead,
        Permission::WorkspacesUpdate,
        Permission::WorkspacesDelete,
        Permission::WorkspacesRestore,
        Permission::WorkspacesPurge,
        Permission::WorkspacesManageUsers,
        Permission::WorkspacesHistory,
        Permission::UsersCreate,
        Permission::UsersRead,
        Permission::UsersUpdate,
        Permission::UsersDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::WorkspacesCreate => "workspaces.create",
            Permission::WorkspacesRead => "workspaces.read",
            Permission::WorkspacesUpdate => "workspaces.update",
            Permission::WorkspacesDelete => "workspaces.delete",
            Permission::WorkspacesRestore => "workspaces.restore",
            Permission::WorkspacesPurge => "workspaces.purge",
            Permission::WorkspacesManageUsers => "workspaces.manage_users",
            Permission::WorkspacesHistory => "workspaces.history",
            Permission::UsersCreate => "users.create",
            Permission::UsersRead => "users.read",
            Permission::UsersUpdate => "users.update",
            Permission::UsersDelete => "users.delete",
        }
    }

    /// Entity half of the code (`workspaces` in `workspaces.create`).
    pub fn entity(&self) -> &'static str {
        self.as_str().split_once('.').map(|(e, _)| e).unwrap_or_default()
    }

    /// Action half of the code (`create` in `workspaces.create`).
    pub fn action(&self) -> &'static str {
        self.as_str().split_once('.').map(|(_, a)| a).unwrap_or_default()
    }

    /// Look up a code; unknown codes yield `None` rather than an error.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == code)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl core::str::FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// A granted permission set.
///
/// This is the single membership test shared by server guards and client
/// gating, so both sides agree for the same set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self(Permission::ALL.into_iter().collect())
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// String-keyed membership; unknown codes are never members.
    pub fn contains_code(&self, code: &str) -> bool {
        Permission::from_code(code).is_some_and(|p| self.contains(p))
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
