use serde::Serialize;
use thiserror::Error;

use atrium_core::Workspace;

use crate::{Permission, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),

    #[error("forbidden: not a member of this workspace")]
    NotWorkspaceMember,
}

/// Authorize a principal for a permission.
///
/// - No IO
/// - No panics
/// - Same membership test as the client-side `has_permission`
pub fn authorize(principal: &Principal, required: Permission) -> Result<(), AuthzError> {
    if principal.permissions.contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

/// Authorize a workspace-scoped action.
///
/// The permission check runs first; then non-admin principals must be a
/// member of the workspace.
pub fn authorize_workspace(
    principal: &Principal,
    required: Permission,
    workspace: &Workspace,
) -> Result<(), AuthzError> {
    authorize(principal, required)?;
    if principal.role.bypasses_membership() || workspace.is_member(principal.user_id) {
        Ok(())
    } else {
        Err(AuthzError::NotWorkspaceMember)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry (for display / audit)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub code: &'static str,
    pub entity: &'static str,
    pub action: &'static str,
    pub description: String,
}

/// Complete view of roles and permissions, in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: Vec<RoleDefinition>,
    pub permissions: Vec<PermissionDefinition>,
}

impl RbacRegistry {
    pub fn build() -> Self {
        let roles = Role::ALL
            .into_iter()
            .map(|role| RoleDefinition {
                name: role.as_str(),
                description: role.description(),
                permissions: role.permissions().iter().map(|p| p.as_str()).collect(),
            })
            .collect();

        let permissions = Permission::ALL
            .into_iter()
            .map(|p| PermissionDefinition {
                code: p.as_str(),
                entity: p.entity(),
                action: p.action(),
                description: permission_description(p),
            })
            .collect();

        Self { roles, permissions }
    }
}

fn permission_description(permission: Permission) -> String {
    let action_desc = match permission.action() {
        "read" => "View/list",
        "create" => "Create new",
        "update" => "Edit",
        "delete" => "Delete",
        "restore" => "Restore deleted",
        "purge" => "Permanently delete",
        "manage_users" => "Add/remove members of",
        "history" => "Read the audit history of",
        other => other,
    };
    format!("{} {}", action_desc, permission.entity())
}
