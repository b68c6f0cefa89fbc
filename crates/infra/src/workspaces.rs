//! Workspace repository.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use atrium_core::{Workspace, WorkspaceId};

use crate::StoreError;

pub trait WorkspaceStore: Send + Sync {
    fn insert(&self, workspace: Workspace) -> Result<(), StoreError>;
    fn get(&self, id: WorkspaceId) -> Option<Workspace>;
    /// All workspaces, soft-deleted ones included, oldest first.
    fn list(&self) -> Vec<Workspace>;
    /// Replace the stored workspace if it is still at `expected_version`.
    ///
    /// A stored version that moved on yields [`StoreError::Conflict`].
    fn save(&self, workspace: Workspace, expected_version: u64) -> Result<(), StoreError>;
    /// Hard delete (purge), with the same version check as [`WorkspaceStore::save`].
    fn remove(&self, id: WorkspaceId, expected_version: u64) -> Result<Workspace, StoreError>;
}

fn stale(id: WorkspaceId) -> StoreError {
    StoreError::Conflict(format!("workspace {id} was modified concurrently"))
}

impl<S> WorkspaceStore for Arc<S>
where
    S: WorkspaceStore + ?Sized,
{
    fn insert(&self, workspace: Workspace) -> Result<(), StoreError> {
        (**self).insert(workspace)
    }

    fn get(&self, id: WorkspaceId) -> Option<Workspace> {
        (**self).get(id)
    }

    fn list(&self) -> Vec<Workspace> {
        (**self).list()
    }

    fn save(&self, workspace: Workspace, expected_version: u64) -> Result<(), StoreError> {
        (**self).save(workspace, expected_version)
    }

    fn remove(&self, id: WorkspaceId, expected_version: u64) -> Result<Workspace, StoreError> {
        (**self).remove(id, expected_version)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWorkspaceStore {
    inner: RwLock<HashMap<WorkspaceId, Workspace>>,
}

impl InMemoryWorkspaceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkspaceStore for InMemoryWorkspaceStore {
    fn insert(&self, workspace: Workspace) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if map.contains_key(&workspace.id) {
            return Err(StoreError::Conflict(format!("workspace {} already exists", workspace.id)));
        }
        map.insert(workspace.id, workspace);
        Ok(())
    }

    fn get(&self, id: WorkspaceId) -> Option<Workspace> {
        self.inner.read().ok()?.get(&id).cloned()
    }

    fn list(&self) -> Vec<Workspace> {
        let Ok(map) = self.inner.read() else {
            return vec![];
        };
        let mut all: Vec<Workspace> = map.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    fn save(&self, workspace: Workspace, expected_version: u64) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let existing = map.get_mut(&workspace.id).ok_or(StoreError::NotFound)?;
        if existing.version != expected_version {
            return Err(stale(workspace.id));
        }
        *existing = workspace;
        Ok(())
    }

    fn remove(&self, id: WorkspaceId, expected_version: u64) -> Result<Workspace, StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        let existing = map.get(&id).ok_or(StoreError::NotFound)?;
        if existing.version != expected_version {
            return Err(stale(id));
        }
        map.remove(&id).ok_or(StoreError::NotFound)
    }
}
