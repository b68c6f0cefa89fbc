use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use atrium_core::{MemberRef, NewWorkspace, UserId, Workspace, WorkspaceHistoryEntry, WorkspaceId, WorkspacePatch};

use crate::app::dto::{self, Items, ListWorkspacesQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_workspaces).post(create_workspace))
        .route(
            "/:id",
            get(get_workspace).patch(update_workspace).delete(delete_workspace),
        )
        .route("/:id/restore", post(restore_workspace))
        .route("/:id/purge", delete(purge_workspace))
        .route("/:id/users", post(add_member))
        .route("/:id/users/:user_id", delete(remove_member))
        .route("/:id/history", get(history))
}

pub async fn list_workspaces(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<ListWorkspacesQuery>, QueryRejection>,
) -> Result<Json<Items<Workspace>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(services.list_workspaces(&principal, query.include_deleted)?.into()))
}

pub async fn create_workspace(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<NewWorkspace>, JsonRejection>,
) -> Result<(StatusCode, Json<Workspace>), ApiError> {
    let Json(body) = body?;
    let workspace = services.create_workspace(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

pub async fn get_workspace(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<Workspace>, ApiError> {
    let id: WorkspaceId = dto::parse_id(&id)?;
    Ok(Json(services.get_workspace(&principal, id)?))
}

pub async fn update_workspace(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<WorkspacePatch>, JsonRejection>,
) -> Result<Json<Workspace>, ApiError> {
    let id: WorkspaceId = dto::parse_id(&id)?;
    let Json(body) = body?;
    Ok(Json(services.update_workspace(&principal, id, body).await?))
}

pub async fn delete_workspace(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: WorkspaceId = dto::parse_id(&id)?;
    services.delete_workspace(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_workspace(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<Workspace>, ApiError> {
    let id: WorkspaceId = dto::parse_id(&id)?;
    Ok(Json(services.restore_workspace(&principal, id).await?))
}

pub async fn purge_workspace(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: WorkspaceId = dto::parse_id(&id)?;
    services.purge_workspace(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<MemberRef>, JsonRejection>,
) -> Result<Json<Workspace>, ApiError> {
    let id: WorkspaceId = dto::parse_id(&id)?;
    let Json(body) = body?;
    Ok(Json(services.add_member(&principal, id, body).await?))
}

pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<Json<Workspace>, ApiError> {
    let id: WorkspaceId = dto::parse_id(&id)?;
    let user_id: UserId = dto::parse_id(&user_id)?;
    Ok(Json(services.remove_member(&principal, id, user_id).await?))
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<Items<WorkspaceHistoryEntry>>, ApiError> {
    let id: WorkspaceId = dto::parse_id(&id)?;
    Ok(Json(services.workspace_history(&principal, id).await?.into()))
}
