//! `atrium-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod history;
pub mod id;
pub mod workspace;

pub use error::{DomainError, DomainResult};
pub use history::{HistoryAction, NewHistoryEntry, WorkspaceHistoryEntry};
pub use id::{HistoryEntryId, UserId, WorkspaceId};
pub use workspace::{FieldChange, MemberRef, NewWorkspace, Workspace, WorkspacePatch};
