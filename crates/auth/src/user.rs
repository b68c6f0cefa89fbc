//! User identity records.
//!
//! [`User`] is the server-side record (includes the password hash).
//! [`UserProfile`] is its public projection, and [`CachedUser`] is the
//! snapshot a client keeps for synchronous permission checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atrium_core::{DomainError, DomainResult, UserId};

use crate::{Permission, PermissionSet, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Lowercased, trimmed email; rejects values without a local part and domain.
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(DomainError::validation("email is not valid")),
    }
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }

    pub fn cached(&self) -> CachedUser {
        CachedUser {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            permissions: self.role.permissions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Denormalized principal snapshot returned at login and cached by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl CachedUser {
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }
}

/// Pure UI-side check: is `permission` in the user's granted set?
///
/// Unknown permission strings are simply not granted.
pub fn has_permission(user: &CachedUser, permission: &str) -> bool {
    user.permissions.contains_code(permission)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer() -> CachedUser {
        User {
            id: UserId::new(),
            email: "v@example.com".into(),
            name: "V".into(),
            role: Role::Viewer,
            password_hash: String::new(),
            created_at: Utc::now(),
        }
        .cached()
    }

    #[test]
    fn cached_user_gets_role_permissions() {
        let user = viewer();
        assert!(has_permission(&user, "workspaces.read"));
        assert!(!has_permission(&user, "workspaces.create"));
        assert!(user.can(Permission::WorkspacesRead));
    }

    #[test]
    fn unknown_codes_are_denied() {
        let user = viewer();
        assert!(!has_permission(&user, "workspaces.read "));
        assert!(!has_permission(&user, "WORKSPACES.READ"));
        assert!(!has_permission(&user, "🙂"));
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(normalize_email("ada").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ada@localhost").is_err());
    }
}
