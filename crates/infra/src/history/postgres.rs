//! Postgres-backed history log.
//!
//! Entries live in `workspace_history`, with no foreign key to workspaces so
//! the trail outlives a purged workspace. `seq` breaks `created_at` ties in
//! append order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use atrium_core::{
    HistoryAction, HistoryEntryId, NewHistoryEntry, UserId, WorkspaceHistoryEntry, WorkspaceId,
};

use super::{HistoryError, HistoryLog};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS workspace_history (
    seq          BIGSERIAL PRIMARY KEY,
    id           UUID NOT NULL UNIQUE,
    workspace_id UUID NOT NULL,
    user_id      UUID NOT NULL,
    action       TEXT NOT NULL,
    field        TEXT NULL,
    old_value    TEXT NULL,
    new_value    TEXT NULL,
    metadata     JSONB NULL,
    created_at   TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS workspace_history_by_workspace
    ON workspace_history (workspace_id, created_at, seq)
"#;

#[derive(Debug, Clone)]
pub struct PostgresHistoryLog {
    pool: Arc<PgPool>,
}

impl PostgresHistoryLog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the table and index if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), HistoryError> {
        sqlx::query(CREATE_TABLE)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        sqlx::query(CREATE_INDEX)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl HistoryLog for PostgresHistoryLog {
    #[instrument(
        skip(self, entry),
        fields(workspace_id = %entry.workspace_id, action = %entry.action),
        err
    )]
    async fn record(&self, entry: NewHistoryEntry) -> Result<WorkspaceHistoryEntry, HistoryError> {
        entry.validate()?;

        let id = HistoryEntryId::new();

        // Timestamp assigned by the database so ordering follows commit-time clock.
        let row = sqlx::query(
            r#"
            INSERT INTO workspace_history
                (id, workspace_id, user_id, action, field, old_value, new_value, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
            RETURNING created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(entry.workspace_id.as_uuid())
        .bind(entry.user_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(entry.field.as_deref())
        .bind(entry.old_value.as_deref())
        .bind(entry.new_value.as_deref())
        .bind(entry.metadata.clone())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("record", e))?;

        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("record", e))?;

        Ok(entry.into_entry(id, created_at))
    }

    #[instrument(skip(self), fields(workspace_id = %workspace_id), err)]
    async fn list_for_workspace(
        &self,
        workspace_id: WorkspaceId,
    ) -> Result<Vec<WorkspaceHistoryEntry>, HistoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, workspace_id, user_id, action, field, old_value, new_value, metadata, created_at
            FROM workspace_history
            WHERE workspace_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(workspace_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_workspace", e))?;

        rows.iter().map(entry_from_row).collect()
    }
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> Result<WorkspaceHistoryEntry, HistoryError> {
    let get_err = |e: sqlx::Error| map_sqlx_error("decode_row", e);

    let action: String = row.try_get("action").map_err(get_err)?;
    let action: HistoryAction = action.parse()?;

    Ok(WorkspaceHistoryEntry {
        id: HistoryEntryId::from_uuid(row.try_get("id").map_err(get_err)?),
        workspace_id: WorkspaceId::from_uuid(row.try_get("workspace_id").map_err(get_err)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(get_err)?),
        action,
        field: row.try_get("field").map_err(get_err)?,
        old_value: row.try_get("old_value").map_err(get_err)?,
        new_value: row.try_get("new_value").map_err(get_err)?,
        metadata: row.try_get("metadata").map_err(get_err)?,
        created_at: row.try_get("created_at").map_err(get_err)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> HistoryError {
    match err {
        sqlx::Error::Database(db_err) => HistoryError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            HistoryError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => HistoryError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
