//! Client for the atrium API.
//!
//! Requests flow through a [`Pipeline`] of middlewares in front of a
//! [`Transport`]. The [`AuthInterceptor`] attaches the stored bearer token and
//! drives the single-flight refresh in [`AuthSession`] when the server answers
//! `401`. Tokens persist through a [`TokenStore`] over any [`KeyValueStorage`].

pub mod api;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod session;
pub mod storage;
pub mod transport;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use interceptor::{AuthInterceptor, Middleware, Next, Pipeline};
pub use session::{AuthSession, SessionTicket};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError, TokenStore};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};
