//! Workspace domain model.
//!
//! Workspaces are the tenant boundary. Mutations return what changed so the
//! caller can record one history entry per logical change.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult, UserId, WorkspaceId};

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub member_ids: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Bumped by every successful mutation; stores compare it before writing.
    #[serde(default)]
    pub version: u64,
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkspace {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update; `None` leaves the field untouched, an empty description clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of an add-member request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub user_id: UserId,
}

/// A single field that changed during an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

fn normalize_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("workspace name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "workspace name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn normalize_description(description: &str) -> DomainResult<Option<String>> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(DomainError::validation(format!(
            "workspace description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok((!description.is_empty()).then(|| description.to_string()))
}

impl Workspace {
    /// Create a workspace owned (and joined) by `owner_id`.
    pub fn create(
        id: WorkspaceId,
        name: &str,
        description: Option<&str>,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = normalize_name(name)?;
        let description = match description {
            Some(d) => normalize_description(d)?,
            None => None,
        };

        Ok(Self {
            id,
            name,
            description,
            owner_id,
            member_ids: BTreeSet::from([owner_id]),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            version: 1,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member_ids.contains(&user_id)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if self.is_deleted() {
            return Err(DomainError::invariant("workspace is deleted"));
        }
        Ok(())
    }

    /// Apply a patch and report each field whose value actually changed.
    pub fn apply_patch(
        &mut self,
        patch: &WorkspacePatch,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<FieldChange>> {
        self.ensure_active()?;

        // Validate everything before mutating anything.
        let name = patch.name.as_deref().map(normalize_name).transpose()?;
        let description = patch
            .description
            .as_deref()
            .map(normalize_description)
            .transpose()?;

        let mut changes = Vec::new();

        if let Some(name) = name {
            if name != self.name {
                changes.push(FieldChange {
                    field: "name",
                    old_value: Some(std::mem::replace(&mut self.name, name.clone())),
                    new_value: Some(name),
                });
            }
        }

        if let Some(description) = description {
            if description != self.description {
                changes.push(FieldChange {
                    field: "description",
                    old_value: std::mem::replace(&mut self.description, description.clone()),
                    new_value: description,
                });
            }
        }

        if !changes.is_empty() {
            self.touch(now);
        }
        Ok(changes)
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.deleted_at = Some(now);
        self.touch(now);
        Ok(())
    }

    pub fn restore(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_deleted() {
            return Err(DomainError::invariant("workspace is not deleted"));
        }
        self.deleted_at = None;
        self.touch(now);
        Ok(())
    }

    pub fn add_member(&mut self, user_id: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if !self.member_ids.insert(user_id) {
            return Err(DomainError::conflict("user is already a member"));
        }
        self.touch(now);
        Ok(())
    }

    pub fn remove_member(&mut self, user_id: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if user_id == self.owner_id {
            return Err(DomainError::invariant("the owner cannot be removed"));
        }
        if !self.member_ids.remove(&user_id) {
            return Err(DomainError::not_found());
        }
        self.touch(now);
        Ok(())
    }
}
