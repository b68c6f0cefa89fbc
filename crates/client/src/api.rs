//! Typed calls against the atrium API.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use atrium_auth::wire::{
    CreateUserRequest, LoginRequest, LoginResponse, LogoutRequest, UpdateUserRequest,
};
use atrium_auth::{CachedUser, UserProfile, has_permission};
use atrium_core::{
    MemberRef, NewWorkspace, UserId, Workspace, WorkspaceHistoryEntry, WorkspaceId, WorkspacePatch,
};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::interceptor::{AuthInterceptor, Pipeline};
use crate::session::AuthSession;
use crate::storage::{FileStorage, KeyValueStorage, MemoryStorage, TokenStore};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

#[derive(Deserialize)]
struct Items<T> {
    items: Vec<T>,
}

pub struct ApiClient {
    pipeline: Pipeline,
    session: Arc<AuthSession>,
}

impl ApiClient {
    /// HTTP client for `config.base_url`, persisting the session to `config.token_file` if set.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let storage: Arc<dyn KeyValueStorage> = match &config.token_file {
            Some(path) => Arc::new(FileStorage::open(path)?),
            None => Arc::new(MemoryStorage::new()),
        };
        let transport = Arc::new(HttpTransport::new(&config.base_url)?);
        Ok(Self::with_parts(transport, TokenStore::new(storage)))
    }

    pub fn with_parts(transport: Arc<dyn Transport>, tokens: TokenStore) -> Self {
        let session = Arc::new(AuthSession::new(tokens, transport.clone()));
        let pipeline = Pipeline::new(transport).with(AuthInterceptor::new(session.clone()));
        Self { pipeline, session }
    }

    pub fn tokens(&self) -> &TokenStore {
        self.session.tokens()
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Send a raw request through the middleware pipeline.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.pipeline.send(request).await
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        response.json()
    }

    async fn call_empty(&self, request: ApiRequest) -> Result<(), ClientError> {
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────

    /// Log in and persist the tokens and user snapshot.
    pub async fn login(&self, email: &str, password: &str) -> Result<CachedUser, ClientError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation("email and password are required".to_string()));
        }

        let request = ApiRequest::post("/auth/login").anonymous().json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let login: LoginResponse = self.call(request).await?;

        let tokens = self.tokens();
        tokens.set_access_token(&login.access_token)?;
        tokens.set_refresh_token(&login.refresh_token)?;
        tokens.set_cached_user(&login.user)?;

        tracing::info!(user_id = %login.user.id, "logged in");
        Ok(login.user)
    }

    /// Drop the local session and revoke the newest refresh token server-side.
    ///
    /// The local session is cleared even if the server cannot be reached.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let refresh_token = self.session.close().await;

        let Some(refresh_token) = refresh_token else {
            return Ok(());
        };
        let request = ApiRequest::post("/auth/logout")
            .anonymous()
            .json(&LogoutRequest { refresh_token })?;
        if let Err(e) = self.call_empty(request).await {
            tracing::warn!(error = %e, "server-side logout failed; local session cleared");
        }
        Ok(())
    }

    /// Cancel pending refresh waiters without forgetting the session.
    pub fn shutdown(&self) {
        self.session.shutdown();
    }

    /// Fetch the current user and refresh the cached snapshot.
    pub async fn me(&self) -> Result<CachedUser, ClientError> {
        let user: CachedUser = self.call(ApiRequest::get("/auth/me")).await?;
        if let Err(e) = self.tokens().set_cached_user(&user) {
            tracing::warn!(error = %e, "failed to cache current user");
        }
        Ok(user)
    }

    pub fn cached_user(&self) -> Option<CachedUser> {
        self.tokens().cached_user()
    }

    /// UI gate against the cached user. The server still enforces every call.
    pub fn can(&self, permission: &str) -> bool {
        self.cached_user()
            .is_some_and(|user| has_permission(&user, permission))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, ClientError> {
        let items: Items<UserProfile> = self.call(ApiRequest::get("/users")).await?;
        Ok(items.items)
    }

    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<UserProfile, ClientError> {
        if request.email.trim().is_empty() || request.name.trim().is_empty() {
            return Err(ClientError::Validation("email and name are required".to_string()));
        }
        self.call(ApiRequest::post("/users").json(request)?).await
    }

    pub async fn get_user(&self, id: UserId) -> Result<UserProfile, ClientError> {
        self.call(ApiRequest::get(format!("/users/{id}"))).await
    }

    pub async fn update_user(&self, id: UserId, request: &UpdateUserRequest) -> Result<UserProfile, ClientError> {
        self.call(ApiRequest::patch(format!("/users/{id}")).json(request)?)
            .await
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), ClientError> {
        self.call_empty(ApiRequest::delete(format!("/users/{id}"))).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Workspaces
    // ─────────────────────────────────────────────────────────────────────

    pub async fn list_workspaces(&self, include_deleted: bool) -> Result<Vec<Workspace>, ClientError> {
        let path = if include_deleted {
            "/workspaces?include_deleted=true"
        } else {
            "/workspaces"
        };
        let items: Items<Workspace> = self.call(ApiRequest::get(path)).await?;
        Ok(items.items)
    }

    pub async fn create_workspace(&self, request: &NewWorkspace) -> Result<Workspace, ClientError> {
        if request.name.trim().is_empty() {
            return Err(ClientError::Validation("workspace name must not be empty".to_string()));
        }
        self.call(ApiRequest::post("/workspaces").json(request)?).await
    }

    pub async fn get_workspace(&self, id: WorkspaceId) -> Result<Workspace, ClientError> {
        self.call(ApiRequest::get(format!("/workspaces/{id}"))).await
    }

    pub async fn update_workspace(&self, id: WorkspaceId, patch: &WorkspacePatch) -> Result<Workspace, ClientError> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ClientError::Validation("workspace name must not be empty".to_string()));
        }
        self.call(ApiRequest::patch(format!("/workspaces/{id}")).json(patch)?)
            .await
    }

    pub async fn delete_workspace(&self, id: WorkspaceId) -> Result<(), ClientError> {
        self.call_empty(ApiRequest::delete(format!("/workspaces/{id}"))).await
    }

    pub async fn restore_workspace(&self, id: WorkspaceId) -> Result<Workspace, ClientError> {
        self.call(ApiRequest::post(format!("/workspaces/{id}/restore"))).await
    }

    pub async fn purge_workspace(&self, id: WorkspaceId) -> Result<(), ClientError> {
        self.call_empty(ApiRequest::delete(format!("/workspaces/{id}/purge")))
            .await
    }

    pub async fn add_member(&self, id: WorkspaceId, user_id: UserId) -> Result<Workspace, ClientError> {
        self.call(ApiRequest::post(format!("/workspaces/{id}/users")).json(&MemberRef { user_id })?)
            .await
    }

    pub async fn remove_member(&self, id: WorkspaceId, user_id: UserId) -> Result<Workspace, ClientError> {
        self.call(ApiRequest::delete(format!("/workspaces/{id}/users/{user_id}")))
            .await
    }

    pub async fn workspace_history(&self, id: WorkspaceId) -> Result<Vec<WorkspaceHistoryEntry>, ClientError> {
        let items: Items<WorkspaceHistoryEntry> = self
            .call(ApiRequest::get(format!("/workspaces/{id}/history")))
            .await?;
        Ok(items.items)
    }
}
