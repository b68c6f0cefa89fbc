use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use atrium_auth::wire::{CreateUserRequest, UpdateUserRequest};
use atrium_auth::UserProfile;
use atrium_core::UserId;

use crate::app::dto::{self, Items};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<Items<UserProfile>>, ApiError> {
    Ok(Json(services.list_users(&principal)?.into()))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let Json(body) = body?;
    let profile = services.create_user(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    let id: UserId = dto::parse_id(&id)?;
    Ok(Json(services.get_user(&principal, id)?))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserProfile>, ApiError> {
    let id: UserId = dto::parse_id(&id)?;
    let Json(body) = body?;
    Ok(Json(services.update_user(&principal, id, body)?))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: UserId = dto::parse_id(&id)?;
    services.delete_user(&principal, id)?;
    Ok(StatusCode::NO_CONTENT)
}
