//! Append-only workspace history log.
//!
//! The log records what workspace mutation handlers tell it; it never detects
//! changes itself and exposes no update or delete operation.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use atrium_core::{DomainError, NewHistoryEntry, WorkspaceHistoryEntry, WorkspaceId};

pub use in_memory::InMemoryHistoryLog;
pub use postgres::PostgresHistoryLog;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid history entry: {0}")]
    Invalid(#[from] DomainError),

    #[error("history storage failure: {0}")]
    Storage(String),
}

/// Audit trail of workspace mutations.
///
/// Implementations must:
/// - validate the entry (`NewHistoryEntry::validate`) before persisting it
/// - assign the id and `created_at`
/// - never modify or remove a recorded entry
/// - return `list_for_workspace` ordered by `created_at` ascending, ties in append order
#[async_trait]
pub trait HistoryLog: Send + Sync {
    async fn record(&self, entry: NewHistoryEntry) -> Result<WorkspaceHistoryEntry, HistoryError>;

    async fn list_for_workspace(
        &self,
        workspace_id: WorkspaceId,
    ) -> Result<Vec<WorkspaceHistoryEntry>, HistoryError>;
}

#[async_trait]
impl<S> HistoryLog for Arc<S>
where
    S: HistoryLog + ?Sized,
{
    async fn record(&self, entry: NewHistoryEntry) -> Result<WorkspaceHistoryEntry, HistoryError> {
        (**self).record(entry).await
    }

    async fn list_for_workspace(
        &self,
        workspace_id: WorkspaceId,
    ) -> Result<Vec<WorkspaceHistoryEntry>, HistoryError> {
        (**self).list_for_workspace(workspace_id).await
    }
}
