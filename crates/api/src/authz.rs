//! API-side authorization guards.
//!
//! These enforce permissions at the handler boundary, before any store is
//! touched, using the same registry the client gates its UI with.

use atrium_auth::{Permission, authorize, authorize_workspace};
use atrium_core::Workspace;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

pub fn require(principal: &PrincipalContext, permission: Permission) -> Result<(), ApiError> {
    authorize(principal.principal(), permission).map_err(|e| {
        tracing::info!(
            user_id = %principal.user_id(),
            permission = %permission,
            "authorization denied"
        );
        ApiError::from(e)
    })
}

pub fn require_workspace(
    principal: &PrincipalContext,
    permission: Permission,
    workspace: &Workspace,
) -> Result<(), ApiError> {
    authorize_workspace(principal.principal(), permission, workspace).map_err(|e| {
        tracing::info!(
            user_id = %principal.user_id(),
            workspace_id = %workspace.id,
            permission = %permission,
            reason = %e,
            "workspace authorization denied"
        );
        ApiError::from(e)
    })
}
