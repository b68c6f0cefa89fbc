use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use atrium_core::{HistoryEntryId, NewHistoryEntry, WorkspaceHistoryEntry, WorkspaceId};

use super::{HistoryError, HistoryLog};

/// In-memory append-only history log.
///
/// Intended for tests/dev. Timestamps are clamped so they never go backwards
/// within a workspace, which keeps append order and `created_at` order equal.
#[derive(Debug, Default)]
pub struct InMemoryHistoryLog {
    entries: RwLock<HashMap<WorkspaceId, Vec<WorkspaceHistoryEntry>>>,
}

impl InMemoryHistoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryLog for InMemoryHistoryLog {
    async fn record(&self, entry: NewHistoryEntry) -> Result<WorkspaceHistoryEntry, HistoryError> {
        entry.validate()?;

        let mut entries = self
            .entries
            .write()
            .map_err(|_| HistoryError::Storage("lock poisoned".to_string()))?;

        let stream = entries.entry(entry.workspace_id).or_default();
        let now = Utc::now();
        let created_at = match stream.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };

        let recorded = entry.into_entry(HistoryEntryId::new(), created_at);
        stream.push(recorded.clone());
        Ok(recorded)
    }

    async fn list_for_workspace(
        &self,
        workspace_id: WorkspaceId,
    ) -> Result<Vec<WorkspaceHistoryEntry>, HistoryError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| HistoryError::Storage("lock poisoned".to_string()))?;

        Ok(entries.get(&workspace_id).cloned().unwrap_or_default())
    }
}
