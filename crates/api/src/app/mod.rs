//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores and the flows behind each endpoint
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: query/response envelopes and path parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, BuildError};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> Result<Router, BuildError> {
    let services = Arc::new(AppServices::build(config).await?);
    Ok(router(services))
}

/// Router over already-wired services (tests inject their own).
pub fn router(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        jwt: services.jwt.clone(),
    };

    // Protected routes: require a valid bearer token.
    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .merge(routes::public_router())
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
