//! HTTP API: configuration, routing, auth middleware, and request/response mapping.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;

pub use app::{build_app, router, AppServices, BuildError};
pub use config::{ApiConfig, ConfigError};
