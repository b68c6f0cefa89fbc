//! Workspace audit history (append-only ledger entries).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{DomainError, DomainResult, HistoryEntryId, UserId, WorkspaceId};

/// Kind of workspace mutation recorded in the audit trail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryAction {
    Created,
    Updated,
    Deleted,
    Restored,
    UserAdded,
    UserRemoved,
    PermanentlyDeleted,
}

impl HistoryAction {
    pub const ALL: [HistoryAction; 7] = [
        HistoryAction::Created,
        HistoryAction::Updated,
        HistoryAction::Deleted,
        HistoryAction::Restored,
        HistoryAction::UserAdded,
        HistoryAction::UserRemoved,
        HistoryAction::PermanentlyDeleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "CREATED",
            HistoryAction::Updated => "UPDATED",
            HistoryAction::Deleted => "DELETED",
            HistoryAction::Restored => "RESTORED",
            HistoryAction::UserAdded => "USER_ADDED",
            HistoryAction::UserRemoved => "USER_REMOVED",
            HistoryAction::PermanentlyDeleted => "PERMANENTLY_DELETED",
        }
    }
}

impl core::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for HistoryAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HistoryAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown history action '{s}'")))
    }
}

/// A history entry as handed to the log, before an id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub action: HistoryAction,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub metadata: Option<JsonValue>,
}

impl NewHistoryEntry {
    pub fn new(workspace_id: WorkspaceId, user_id: UserId, action: HistoryAction) -> Self {
        Self {
            workspace_id,
            user_id,
            action,
            field: None,
            old_value: None,
            new_value: None,
            metadata: None,
        }
    }

    /// Field-level `UPDATED` entry.
    pub fn field_change(
        workspace_id: WorkspaceId,
        user_id: UserId,
        field: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            field: Some(field.into()),
            old_value,
            new_value,
            ..Self::new(workspace_id, user_id, HistoryAction::Updated)
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Field-level columns are reserved for `UPDATED` entries.
    pub fn validate(&self) -> DomainResult<()> {
        match self.action {
            HistoryAction::Updated => match self.field.as_deref() {
                Some(f) if !f.trim().is_empty() => Ok(()),
                _ => Err(DomainError::validation("UPDATED entries require a field name")),
            },
            other => {
                if self.field.is_some() || self.old_value.is_some() || self.new_value.is_some() {
                    return Err(DomainError::validation(format!(
                        "{other} entries must not carry field-level values"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Seal the entry with an id and timestamp. Only history logs call this.
    pub fn into_entry(self, id: HistoryEntryId, created_at: DateTime<Utc>) -> WorkspaceHistoryEntry {
        WorkspaceHistoryEntry {
            id,
            workspace_id: self.workspace_id,
            user_id: self.user_id,
            action: self.action,
            field: self.field,
            old_value: self.old_value,
            new_value: self.new_value,
            metadata: self.metadata,
            created_at,
        }
    }
}

/// Immutable audit record of a single workspace mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceHistoryEntry {
    pub id: HistoryEntryId,
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub action: HistoryAction,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_serialize_as_screaming_snake_case() {
        let json = serde_json::to_string(&HistoryAction::PermanentlyDeleted).unwrap();
        assert_eq!(json, "\"PERMANENTLY_DELETED\"");
        for action in HistoryAction::ALL {
            let parsed: HistoryAction = action.as_str().parse().unwrap();
            assert_eq!(parsed, action);
        }
    }

    #[test]
    fn updated_requires_field() {
        let entry = NewHistoryEntry::new(WorkspaceId::new(), UserId::new(), HistoryAction::Updated);
        assert!(matches!(entry.validate(), Err(DomainError::Validation(_))));

        let entry = NewHistoryEntry::field_change(
            WorkspaceId::new(),
            UserId::new(),
            "name",
            Some("A".into()),
            Some("B".into()),
        );
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn non_update_entries_reject_field_values() {
        let mut entry = NewHistoryEntry::new(WorkspaceId::new(), UserId::new(), HistoryAction::Deleted);
        assert!(entry.validate().is_ok());
        entry.old_value = Some("x".into());
        assert!(entry.validate().is_err());
    }
}
