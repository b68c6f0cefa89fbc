use thiserror::Error;

use crate::storage::StorageError;

/// Every failure surfaced to callers of the client.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The request was rejected locally before being sent.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The session is gone: no refresh token, or the server rejected it.
    #[error("authentication required")]
    AuthenticationRequired,

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transport failure. Never retried.
    #[error("network error: {0}")]
    Network(String),

    #[error("api error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The session was closed (logout or shutdown) while the request waited.
    #[error("session closed")]
    SessionClosed,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::AuthenticationRequired => Some(401),
            _ => None,
        }
    }
}
