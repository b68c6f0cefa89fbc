use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use atrium_auth::wire::{LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse};
use atrium_auth::{CachedUser, RbacRegistry};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn public_router() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn router() -> Router {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/permissions", get(permissions))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(body) = body?;
    Ok(Json(services.login(&body.email, &body.password).await?))
}

pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let Json(body) = body?;
    Ok(Json(services.refresh(&body.refresh_token)?))
}

/// Always succeeds so a client can drop its session even with a stale token.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(body) = body?;
    services.logout(&body.refresh_token);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<CachedUser>, ApiError> {
    Ok(Json(services.current_user(&principal)?))
}

pub async fn permissions() -> Json<RbacRegistry> {
    Json(RbacRegistry::build())
}
