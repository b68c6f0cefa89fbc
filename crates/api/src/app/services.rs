//! Service wiring and the flows behind each endpoint.
//!
//! Handlers stay thin: they extract request data and call into
//! [`AppServices`], which owns the stores and enforces authorization.
//! Workspace mutations record exactly one history entry per logical change,
//! after the mutation has been persisted.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;

use atrium_auth::wire::{
    CreateUserRequest, LoginResponse, RefreshResponse, UpdateUserRequest,
};
use atrium_auth::{
    CachedUser, Hs256Jwt, Permission, User, UserProfile, hash_password, normalize_email,
    verify_password,
};
use atrium_core::{
    HistoryAction, MemberRef, NewHistoryEntry, NewWorkspace, UserId, Workspace,
    WorkspaceHistoryEntry, WorkspaceId, WorkspacePatch,
};
use atrium_infra::{
    HistoryError, HistoryLog, InMemoryHistoryLog, InMemoryRefreshTokenStore, InMemoryUserStore,
    InMemoryWorkspaceStore, PostgresHistoryLog, RefreshTokenStore, UserStore, WorkspaceStore,
};

use crate::app::errors::ApiError;
use crate::authz;
use crate::config::{ApiConfig, BootstrapAdmin};
use crate::context::PrincipalContext;

const MIN_PASSWORD_LEN: usize = 8;

/// Argon2 is CPU-bound; keep it off the async workers.
async fn hash_off_runtime(password: String) -> Result<String, ApiError> {
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))?;
    Ok(hashed?)
}

async fn verify_off_runtime(hash: String, password: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .map_err(|e| ApiError::Internal(format!("password verification task failed: {e}")))
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to connect to Postgres: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to prepare history log: {0}")]
    History(#[from] HistoryError),

    #[error("failed to create bootstrap admin: {0}")]
    Bootstrap(#[from] ApiError),
}

pub struct AppServices {
    pub jwt: Arc<Hs256Jwt>,
    pub users: Arc<dyn UserStore>,
    pub workspaces: Arc<dyn WorkspaceStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub history: Arc<dyn HistoryLog>,
    access_token_ttl: Duration,
}

impl AppServices {
    /// Fully in-memory wiring (dev/test).
    pub fn in_memory(config: &ApiConfig) -> Self {
        Self::with_history(config, Arc::new(InMemoryHistoryLog::new()))
    }

    fn with_history(config: &ApiConfig, history: Arc<dyn HistoryLog>) -> Self {
        Self {
            jwt: Arc::new(Hs256Jwt::new(config.jwt_secret.as_bytes())),
            users: Arc::new(InMemoryUserStore::new()),
            workspaces: Arc::new(InMemoryWorkspaceStore::new()),
            refresh_tokens: Arc::new(InMemoryRefreshTokenStore::new(config.refresh_token_ttl)),
            history,
            access_token_ttl: config.access_token_ttl,
        }
    }

    /// Wiring selected by configuration: Postgres history log when `DATABASE_URL` is set.
    pub async fn build(config: &ApiConfig) -> Result<Self, BuildError> {
        let services = match &config.database_url {
            Some(url) => {
                let pool = sqlx::PgPool::connect(url).await?;
                let history = PostgresHistoryLog::new(pool);
                history.ensure_schema().await?;
                tracing::info!("workspace history stored in Postgres");
                Self::with_history(config, Arc::new(history))
            }
            None => {
                tracing::info!("using in-memory stores");
                Self::in_memory(config)
            }
        };

        if let Some(admin) = &config.bootstrap_admin {
            services.bootstrap_admin(admin).await?;
        }

        Ok(services)
    }

    /// Create the configured admin account if the directory is still empty.
    pub async fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> Result<(), ApiError> {
        if !self.users.list().is_empty() {
            return Ok(());
        }
        let profile = self
            .register_user(CreateUserRequest {
                email: admin.email.clone(),
                name: "Administrator".to_string(),
                password: admin.password.clone(),
                role: atrium_auth::Role::Admin,
            })
            .await?;
        tracing::info!(user_id = %profile.id, "bootstrap admin created");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let rejected = || {
            tracing::info!("login rejected");
            ApiError::InvalidCredentials
        };
        let email = normalize_email(email).map_err(|_| ApiError::InvalidCredentials)?;
        let user = self.users.find_by_email(&email).ok_or_else(rejected)?;
        if !verify_off_runtime(user.password_hash.clone(), password.to_string()).await? {
            return Err(rejected());
        }

        let now = Utc::now();
        let access_token = self.jwt.issue(user.id, user.role, now, self.access_token_ttl)?;
        let refresh_token = self.refresh_tokens.issue(user.id, now)?;

        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: user.cached(),
        })
    }

    /// Rotate a refresh token and mint a new access token for its owner.
    pub fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        if refresh_token.trim().is_empty() {
            return Err(ApiError::Validation("refresh_token must not be empty".to_string()));
        }

        let now = Utc::now();
        let (user_id, rotated) = self.refresh_tokens.rotate(refresh_token, now).map_err(|e| {
            tracing::info!(reason = %e, "refresh rejected");
            ApiError::from(e)
        })?;

        let Some(user) = self.users.get(user_id) else {
            self.refresh_tokens.revoke(&rotated, now);
            return Err(ApiError::InvalidRefreshToken("user no longer exists".to_string()));
        };

        let access_token = self.jwt.issue(user.id, user.role, now, self.access_token_ttl)?;
        tracing::info!(user_id = %user.id, "access token refreshed");
        Ok(RefreshResponse {
            access_token,
            refresh_token: Some(rotated),
        })
    }

    pub fn logout(&self, refresh_token: &str) {
        let revoked = self.refresh_tokens.revoke(refresh_token, Utc::now());
        tracing::info!(revoked, "logout");
    }

    pub fn current_user(&self, principal: &PrincipalContext) -> Result<CachedUser, ApiError> {
        self.users
            .get(principal.user_id())
            .map(|u| u.cached())
            .ok_or_else(|| ApiError::Unauthenticated("user no longer exists".to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    /// Create a user without an authorization check (bootstrap and guarded handlers).
    pub async fn register_user(&self, req: CreateUserRequest) -> Result<UserProfile, ApiError> {
        let email = normalize_email(&req.email)?;
        let name = req.name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation("name must not be empty".to_string()));
        }
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user = User {
            id: UserId::new(),
            email,
            name: name.to_string(),
            role: req.role,
            password_hash: hash_off_runtime(req.password).await?,
            created_at: Utc::now(),
        };
        self.users.insert(user.clone())?;
        Ok(user.profile())
    }

    pub async fn create_user(
        &self,
        principal: &PrincipalContext,
        req: CreateUserRequest,
    ) -> Result<UserProfile, ApiError> {
        authz::require(principal, Permission::UsersCreate)?;
        let profile = self.register_user(req).await?;
        tracing::info!(actor = %principal.user_id(), user_id = %profile.id, "user created");
        Ok(profile)
    }

    pub fn list_users(&self, principal: &PrincipalContext) -> Result<Vec<UserProfile>, ApiError> {
        authz::require(principal, Permission::UsersRead)?;
        Ok(self.users.list().iter().map(User::profile).collect())
    }

    /// Anyone may read their own profile; other profiles need `users.read`.
    pub fn get_user(&self, principal: &PrincipalContext, id: UserId) -> Result<UserProfile, ApiError> {
        if id != principal.user_id() {
            authz::require(principal, Permission::UsersRead)?;
        }
        self.users
            .get(id)
            .map(|u| u.profile())
            .ok_or(ApiError::NotFound("user"))
    }

    pub fn update_user(
        &self,
        principal: &PrincipalContext,
        id: UserId,
        req: UpdateUserRequest,
    ) -> Result<UserProfile, ApiError> {
        authz::require(principal, Permission::UsersUpdate)?;
        let mut user = self.users.get(id).ok_or(ApiError::NotFound("user"))?;

        if let Some(role) = req.role {
            if id == principal.user_id() && role != user.role {
                return Err(ApiError::Forbidden("users cannot change their own role".to_string()));
            }
            user.role = role;
        }
        if let Some(name) = req.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ApiError::Validation("name must not be empty".to_string()));
            }
            user.name = name.to_string();
        }

        self.users.update(user.clone())?;
        tracing::info!(actor = %principal.user_id(), user_id = %id, "user updated");
        Ok(user.profile())
    }

    pub fn delete_user(&self, principal: &PrincipalContext, id: UserId) -> Result<(), ApiError> {
        authz::require(principal, Permission::UsersDelete)?;
        if id == principal.user_id() {
            return Err(ApiError::Invariant("users cannot delete themselves".to_string()));
        }
        self.users.remove(id).map_err(|_| ApiError::NotFound("user"))?;
        let revoked = self.refresh_tokens.revoke_all(id, Utc::now());
        tracing::info!(actor = %principal.user_id(), user_id = %id, revoked, "user deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Workspaces
    // ─────────────────────────────────────────────────────────────────────

    fn load_workspace(&self, id: WorkspaceId) -> Result<Workspace, ApiError> {
        self.workspaces.get(id).ok_or(ApiError::NotFound("workspace"))
    }

    fn authorized_workspace(
        &self,
        principal: &PrincipalContext,
        id: WorkspaceId,
        permission: Permission,
    ) -> Result<Workspace, ApiError> {
        authz::require(principal, permission)?;
        let workspace = self.load_workspace(id)?;
        authz::require_workspace(principal, permission, &workspace)?;
        Ok(workspace)
    }

    async fn record(&self, entry: NewHistoryEntry) -> Result<WorkspaceHistoryEntry, ApiError> {
        let workspace_id = entry.workspace_id;
        let action = entry.action;
        self.history.record(entry).await.map_err(|e| {
            tracing::error!(%workspace_id, %action, error = %e, "failed to record workspace history");
            ApiError::from(e)
        })
    }

    /// Workspaces the principal can see; soft-deleted ones only on request.
    pub fn list_workspaces(
        &self,
        principal: &PrincipalContext,
        include_deleted: bool,
    ) -> Result<Vec<Workspace>, ApiError> {
        authz::require(principal, Permission::WorkspacesRead)?;
        if include_deleted {
            authz::require(principal, Permission::WorkspacesRestore)?;
        }

        let everything = principal.role().bypasses_membership();
        Ok(self
            .workspaces
            .list()
            .into_iter()
            .filter(|w| include_deleted || !w.is_deleted())
            .filter(|w| everything || w.is_member(principal.user_id()))
            .collect())
    }

    pub fn get_workspace(&self, principal: &PrincipalContext, id: WorkspaceId) -> Result<Workspace, ApiError> {
        self.authorized_workspace(principal, id, Permission::WorkspacesRead)
    }

    pub async fn create_workspace(
        &self,
        principal: &PrincipalContext,
        req: NewWorkspace,
    ) -> Result<Workspace, ApiError> {
        authz::require(principal, Permission::WorkspacesCreate)?;

        let workspace = Workspace::create(
            WorkspaceId::new(),
            &req.name,
            req.description.as_deref(),
            principal.user_id(),
            Utc::now(),
        )?;
        self.workspaces.insert(workspace.clone())?;

        self.record(
            NewHistoryEntry::new(workspace.id, principal.user_id(), HistoryAction::Created)
                .with_metadata(serde_json::json!({ "name": workspace.name })),
        )
        .await?;

        tracing::info!(workspace_id = %workspace.id, actor = %principal.user_id(), "workspace created");
        Ok(workspace)
    }

    pub async fn update_workspace(
        &self,
        principal: &PrincipalContext,
        id: WorkspaceId,
        patch: WorkspacePatch,
    ) -> Result<Workspace, ApiError> {
        let mut workspace = self.authorized_workspace(principal, id, Permission::WorkspacesUpdate)?;
        let loaded = workspace.version;
        let changes = workspace.apply_patch(&patch, Utc::now())?;
        if changes.is_empty() {
            return Ok(workspace);
        }

        self.workspaces.save(workspace.clone(), loaded)?;
        for change in changes {
            self.record(NewHistoryEntry::field_change(
                id,
                principal.user_id(),
                change.field,
                change.old_value,
                change.new_value,
            ))
            .await?;
        }

        tracing::info!(workspace_id = %id, actor = %principal.user_id(), "workspace updated");
        Ok(workspace)
    }

    pub async fn delete_workspace(&self, principal: &PrincipalContext, id: WorkspaceId) -> Result<(), ApiError> {
        let mut workspace = self.authorized_workspace(principal, id, Permission::WorkspacesDelete)?;
        let loaded = workspace.version;
        workspace.soft_delete(Utc::now())?;
        self.workspaces.save(workspace, loaded)?;
        self.record(NewHistoryEntry::new(id, principal.user_id(), HistoryAction::Deleted))
            .await?;
        tracing::info!(workspace_id = %id, actor = %principal.user_id(), "workspace deleted");
        Ok(())
    }

    pub async fn restore_workspace(
        &self,
        principal: &PrincipalContext,
        id: WorkspaceId,
    ) -> Result<Workspace, ApiError> {
        let mut workspace = self.authorized_workspace(principal, id, Permission::WorkspacesRestore)?;
        let loaded = workspace.version;
        workspace.restore(Utc::now())?;
        self.workspaces.save(workspace.clone(), loaded)?;
        self.record(NewHistoryEntry::new(id, principal.user_id(), HistoryAction::Restored))
            .await?;
        tracing::info!(workspace_id = %id, actor = %principal.user_id(), "workspace restored");
        Ok(workspace)
    }

    /// Permanently remove a soft-deleted workspace. Its history is kept.
    pub async fn purge_workspace(&self, principal: &PrincipalContext, id: WorkspaceId) -> Result<(), ApiError> {
        let workspace = self.authorized_workspace(principal, id, Permission::WorkspacesPurge)?;
        if !workspace.is_deleted() {
            return Err(ApiError::Invariant(
                "workspace must be deleted before it can be purged".to_string(),
            ));
        }
        self.workspaces.remove(id, workspace.version)?;
        self.record(
            NewHistoryEntry::new(id, principal.user_id(), HistoryAction::PermanentlyDeleted)
                .with_metadata(serde_json::json!({ "name": workspace.name })),
        )
        .await?;
        tracing::info!(workspace_id = %id, actor = %principal.user_id(), "workspace purged");
        Ok(())
    }

    pub async fn add_member(
        &self,
        principal: &PrincipalContext,
        id: WorkspaceId,
        member: MemberRef,
    ) -> Result<Workspace, ApiError> {
        let mut workspace = self.authorized_workspace(principal, id, Permission::WorkspacesManageUsers)?;
        if self.users.get(member.user_id).is_none() {
            return Err(ApiError::NotFound("user"));
        }
        let loaded = workspace.version;
        workspace.add_member(member.user_id, Utc::now())?;
        self.workspaces.save(workspace.clone(), loaded)?;
        self.record(
            NewHistoryEntry::new(id, principal.user_id(), HistoryAction::UserAdded)
                .with_metadata(serde_json::json!({ "member_id": member.user_id })),
        )
        .await?;
        tracing::info!(workspace_id = %id, member_id = %member.user_id, "workspace member added");
        Ok(workspace)
    }

    pub async fn remove_member(
        &self,
        principal: &PrincipalContext,
        id: WorkspaceId,
        member_id: UserId,
    ) -> Result<Workspace, ApiError> {
        let mut workspace = self.authorized_workspace(principal, id, Permission::WorkspacesManageUsers)?;
        let loaded = workspace.version;
        workspace
            .remove_member(member_id, Utc::now())
            .map_err(|e| match e {
                atrium_core::DomainError::NotFound => ApiError::NotFound("member"),
                other => ApiError::from(other),
            })?;
        self.workspaces.save(workspace.clone(), loaded)?;
        self.record(
            NewHistoryEntry::new(id, principal.user_id(), HistoryAction::UserRemoved)
                .with_metadata(serde_json::json!({ "member_id": member_id })),
        )
        .await?;
        tracing::info!(workspace_id = %id, %member_id, "workspace member removed");
        Ok(workspace)
    }

    /// History of a workspace. Admins may also read the history of purged workspaces.
    pub async fn workspace_history(
        &self,
        principal: &PrincipalContext,
        id: WorkspaceId,
    ) -> Result<Vec<WorkspaceHistoryEntry>, ApiError> {
        authz::require(principal, Permission::WorkspacesHistory)?;
        match self.workspaces.get(id) {
            Some(workspace) => {
                authz::require_workspace(principal, Permission::WorkspacesHistory, &workspace)?
            }
            None if principal.role().bypasses_membership() => {}
            None => return Err(ApiError::NotFound("workspace")),
        }
        Ok(self.history.list_for_workspace(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use atrium_auth::{Principal, Role};
    use atrium_infra::StoreError;

    fn services() -> AppServices {
        AppServices::in_memory(&ApiConfig::new("test-secret"))
    }

    async fn register(services: &AppServices, email: &str, role: Role) -> PrincipalContext {
        let profile = services
            .register_user(CreateUserRequest {
                email: email.to_string(),
                name: "Test".to_string(),
                password: "password123".to_string(),
                role,
            })
            .await
            .unwrap();
        PrincipalContext::new(Principal::new(profile.id, role))
    }

    #[tokio::test]
    async fn update_records_one_entry_per_changed_field() {
        let services = services();
        let owner = register(&services, "owner@example.com", Role::Member).await;

        let ws = services
            .create_workspace(&owner, NewWorkspace { name: "A".into(), description: None })
            .await
            .unwrap();
        services
            .update_workspace(
                &owner,
                ws.id,
                WorkspacePatch {
                    name: Some("B".into()),
                    description: Some("about".into()),
                },
            )
            .await
            .unwrap();
        // No-op patch records nothing.
        services
            .update_workspace(&owner, ws.id, WorkspacePatch { name: Some("B".into()), description: None })
            .await
            .unwrap();

        let history = services.workspace_history(&owner, ws.id).await.unwrap();
        let actions: Vec<_> = history.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![HistoryAction::Created, HistoryAction::Updated, HistoryAction::Updated]
        );
        assert_eq!(history[1].field.as_deref(), Some("name"));
        assert_eq!(history[1].old_value.as_deref(), Some("A"));
        assert_eq!(history[1].new_value.as_deref(), Some("B"));
        assert_eq!(history[2].field.as_deref(), Some("description"));
        assert_eq!(history[2].old_value, None);
        assert!(history.iter().all(|e| e.user_id == owner.user_id()));
    }

    #[tokio::test]
    async fn full_lifecycle_is_audited() {
        let services = services();
        let admin = register(&services, "admin@example.com", Role::Admin).await;
        let other = register(&services, "other@example.com", Role::Viewer).await;

        let ws = services
            .create_workspace(&admin, NewWorkspace { name: "W".into(), description: None })
            .await
            .unwrap();
        services
            .add_member(&admin, ws.id, MemberRef { user_id: other.user_id() })
            .await
            .unwrap();
        services.remove_member(&admin, ws.id, other.user_id()).await.unwrap();
        services.delete_workspace(&admin, ws.id).await.unwrap();
        services.restore_workspace(&admin, ws.id).await.unwrap();
        services.delete_workspace(&admin, ws.id).await.unwrap();
        services.purge_workspace(&admin, ws.id).await.unwrap();

        let actions: Vec<_> = services
            .workspace_history(&admin, ws.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                HistoryAction::Created,
                HistoryAction::UserAdded,
                HistoryAction::UserRemoved,
                HistoryAction::Deleted,
                HistoryAction::Restored,
                HistoryAction::Deleted,
                HistoryAction::PermanentlyDeleted,
            ]
        );
        assert!(services.workspaces.get(ws.id).is_none());
    }

    #[tokio::test]
    async fn failed_mutations_record_nothing() {
        let services = services();
        let owner = register(&services, "owner@example.com", Role::Manager).await;
        let viewer = register(&services, "viewer@example.com", Role::Viewer).await;

        let ws = services
            .create_workspace(&owner, NewWorkspace { name: "W".into(), description: None })
            .await
            .unwrap();

        // Viewer lacks the permission; outsider manager lacks membership.
        assert!(matches!(
            services
                .update_workspace(&viewer, ws.id, WorkspacePatch { name: Some("X".into()), description: None })
                .await,
            Err(ApiError::Forbidden(_))
        ));
        let outsider = register(&services, "outsider@example.com", Role::Manager).await;
        assert!(matches!(
            services.delete_workspace(&outsider, ws.id).await,
            Err(ApiError::Forbidden(_))
        ));
        // Purge requires soft delete first (and manager lacks purge anyway).
        assert!(services.purge_workspace(&owner, ws.id).await.is_err());

        assert_eq!(services.workspace_history(&owner, ws.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_reuse() {
        let services = services();
        register(&services, "a@example.com", Role::Member).await;

        let login = services.login("A@example.com", "password123").await.unwrap();
        let refreshed = services.refresh(&login.refresh_token).unwrap();
        let rotated = refreshed.refresh_token.clone().unwrap();
        assert_ne!(rotated, login.refresh_token);

        assert!(matches!(
            services.refresh(&login.refresh_token),
            Err(ApiError::InvalidRefreshToken(_))
        ));
        // Reuse revoked the whole family.
        assert!(services.refresh(&rotated).is_err());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_unknown_email() {
        let services = services();
        register(&services, "a@example.com", Role::Member).await;
        assert!(matches!(
            services.login("a@example.com", "wrong-password").await,
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            services.login("b@example.com", "password123").await,
            Err(ApiError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn users_cannot_change_their_own_role() {
        let services = services();
        let admin = register(&services, "admin@example.com", Role::Admin).await;
        let err = services
            .update_user(
                &admin,
                admin.user_id(),
                UpdateUserRequest { name: None, role: Some(Role::Viewer) },
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn deleting_a_user_revokes_their_refresh_tokens() {
        let services = services();
        let admin = register(&services, "admin@example.com", Role::Admin).await;
        let member = register(&services, "member@example.com", Role::Member).await;
        let login = services.login("member@example.com", "password123").await.unwrap();

        services.delete_user(&admin, member.user_id()).unwrap();
        assert!(services.refresh(&login.refresh_token).is_err());
    }

    #[tokio::test]
    async fn bootstrap_admin_only_runs_on_empty_directory() {
        let services = services();
        let admin = BootstrapAdmin {
            email: "root@example.com".into(),
            password: "password123".into(),
        };
        services.bootstrap_admin(&admin).await.unwrap();
        services.bootstrap_admin(&admin).await.unwrap();
        assert_eq!(services.users.list().len(), 1);
        assert_eq!(services.users.list()[0].role, Role::Admin);
    }

    /// Lets another writer commit right after the first read of a workspace.
    struct InterleavedWrites {
        inner: InMemoryWorkspaceStore,
        raced: AtomicBool,
    }

    impl WorkspaceStore for InterleavedWrites {
        fn insert(&self, workspace: Workspace) -> Result<(), StoreError> {
            self.inner.insert(workspace)
        }

        fn get(&self, id: WorkspaceId) -> Option<Workspace> {
            let loaded = self.inner.get(id)?;
            if !self.raced.swap(true, Ordering::SeqCst) {
                let mut other = loaded.clone();
                other.add_member(UserId::new(), Utc::now()).unwrap();
                self.inner.save(other, loaded.version).unwrap();
            }
            Some(loaded)
        }

        fn list(&self) -> Vec<Workspace> {
            self.inner.list()
        }

        fn save(&self, workspace: Workspace, expected_version: u64) -> Result<(), StoreError> {
            self.inner.save(workspace, expected_version)
        }

        fn remove(&self, id: WorkspaceId, expected_version: u64) -> Result<Workspace, StoreError> {
            self.inner.remove(id, expected_version)
        }
    }

    #[tokio::test]
    async fn write_from_a_stale_read_conflicts_and_records_nothing() {
        let mut services = services();
        services.workspaces = Arc::new(InterleavedWrites {
            inner: InMemoryWorkspaceStore::new(),
            raced: AtomicBool::new(false),
        });
        let owner = register(&services, "owner@example.com", Role::Manager).await;
        let ws = services
            .create_workspace(&owner, NewWorkspace { name: "W".into(), description: None })
            .await
            .unwrap();

        let err = services.delete_workspace(&owner, ws.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)), "unexpected error: {err:?}");
        assert!(!services.workspaces.get(ws.id).unwrap().is_deleted());

        let history = services.workspace_history(&owner, ws.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Created);

        // A fresh read succeeds.
        services.delete_workspace(&owner, ws.id).await.unwrap();
        assert_eq!(services.workspace_history(&owner, ws.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn password_work_does_not_stall_the_runtime() {
        let services = services();
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
            })
        };

        // Single-threaded runtime: the ticker only runs while these calls are suspended.
        register(&services, "a@example.com", Role::Member).await;
        let after_register = ticks.load(Ordering::SeqCst);
        assert!(after_register > 0);

        services.login("a@example.com", "password123").await.unwrap();
        assert!(ticks.load(Ordering::SeqCst) > after_register);
        ticker.abort();
    }
}
