use axum::{routing::get, Router};

pub mod auth;
pub mod system;
pub mod users;
pub mod workspaces;

/// Endpoints reachable without a bearer token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .merge(auth::public_router())
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .merge(auth::router())
        .nest("/users", users::router())
        .nest("/workspaces", workspaces::router())
}
