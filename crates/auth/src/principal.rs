use atrium_core::UserId;

use crate::{AccessClaims, PermissionSet, Role};

/// A fully resolved principal for authorization decisions.
///
/// Built from verified access-token claims; the permission set is derived from
/// the role so both tiers compute it the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            permissions: role.permissions(),
        }
    }

    /// Principal with an explicit permission set (tests, service accounts).
    pub fn with_permissions(user_id: UserId, role: Role, permissions: PermissionSet) -> Self {
        Self {
            user_id,
            role,
            permissions,
        }
    }
}

impl From<&AccessClaims> for Principal {
    fn from(claims: &AccessClaims) -> Self {
        Self::new(claims.sub, claims.role)
    }
}
