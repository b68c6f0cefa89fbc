//! Infrastructure layer: history log, refresh tokens, user and workspace stores.

pub mod history;
pub mod refresh_tokens;
pub mod users;
pub mod workspaces;

use thiserror::Error;

pub use history::{HistoryError, HistoryLog, InMemoryHistoryLog, PostgresHistoryLog};
pub use refresh_tokens::{InMemoryRefreshTokenStore, RefreshTokenError, RefreshTokenStore};
pub use users::{InMemoryUserStore, UserStore};
pub use workspaces::{InMemoryWorkspaceStore, WorkspaceStore};

/// Failure of a keyed record store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store lock poisoned")]
    Poisoned,
}
