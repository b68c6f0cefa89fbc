//! Session lifecycle and the single-flight token refresh.
//!
//! A request takes a [`SessionTicket`] before it goes out. If it gets `401`
//! it calls [`AuthSession::refresh_after`] with the access token it sent and
//! that ticket. Callers queue on a FIFO gate; whoever gets in first with the
//! stale token performs the refresh. Everyone queued behind it shares the
//! outcome: the new token on success, the same error on failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use atrium_auth::wire::{RefreshRequest, RefreshResponse};

use crate::error::ClientError;
use crate::storage::TokenStore;
use crate::transport::{ApiRequest, Transport};

/// Session state a request observed when it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    epoch: u64,
    refreshes: u64,
}

/// Guarded by the refresh gate.
#[derive(Debug, Default)]
struct RefreshState {
    /// Completed refresh attempts.
    refreshes: u64,
    /// Error of the most recent attempt, `None` if it succeeded.
    last_failure: Option<ClientError>,
}

pub struct AuthSession {
    tokens: TokenStore,
    transport: Arc<dyn Transport>,
    refresh_gate: Mutex<RefreshState>,
    /// Mirror of `RefreshState::refreshes`, readable without the gate.
    refreshes: AtomicU64,
    epoch: AtomicU64,
}

impl AuthSession {
    /// `transport` is used directly for `/auth/refresh`, outside any middleware.
    pub fn new(tokens: TokenStore, transport: Arc<dyn Transport>) -> Self {
        Self {
            tokens,
            transport,
            refresh_gate: Mutex::new(RefreshState::default()),
            refreshes: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Current session generation. Bumped on logout and shutdown.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn ticket(&self) -> SessionTicket {
        SessionTicket {
            epoch: self.epoch(),
            refreshes: self.refreshes.load(Ordering::SeqCst),
        }
    }

    fn ensure_epoch(&self, epoch: u64) -> Result<(), ClientError> {
        if self.epoch() != epoch {
            return Err(ClientError::SessionClosed);
        }
        Ok(())
    }

    /// Obtain an access token newer than `stale`, refreshing at most once
    /// across all concurrent callers.
    ///
    /// `stale` is the token the failed request carried (`None` if it had none).
    /// A refresh that completed after `ticket` was taken is not repeated: its
    /// token, or its error, is returned instead.
    pub async fn refresh_after(&self, stale: Option<&str>, ticket: SessionTicket) -> Result<String, ClientError> {
        let mut state = self.refresh_gate.lock().await;
        self.ensure_epoch(ticket.epoch)?;

        if let Some(current) = self.tokens.access_token() {
            if Some(current.as_str()) != stale {
                tracing::debug!("access token already refreshed by another request");
                return Ok(current);
            }
        }

        if state.refreshes != ticket.refreshes {
            if let Some(failure) = &state.last_failure {
                tracing::debug!(error = %failure, "sharing failed refresh with queued request");
                return Err(failure.clone());
            }
        }

        let outcome = self.perform_refresh().await;
        state.refreshes += 1;
        self.refreshes.store(state.refreshes, Ordering::SeqCst);
        state.last_failure = outcome.as_ref().err().cloned();

        let access_token = outcome?;
        // Tokens are already persisted; a cancelled session still keeps them.
        self.ensure_epoch(ticket.epoch)?;
        Ok(access_token)
    }

    /// One `/auth/refresh` round trip. Must be called with the gate held.
    async fn perform_refresh(&self) -> Result<String, ClientError> {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            tracing::info!("no refresh token stored; session expired");
            self.expire();
            return Err(ClientError::AuthenticationRequired);
        };

        let request = ApiRequest::post("/auth/refresh")
            .anonymous()
            .json(&RefreshRequest { refresh_token })?;

        // Network failures surface unchanged and leave the stored tokens alone.
        let response = self.transport.send(request).await?;

        if response.is_unauthorized() {
            tracing::warn!("refresh token rejected; clearing session");
            self.expire();
            return Err(ClientError::AuthenticationRequired);
        }
        if !response.is_success() {
            return Err(response.into_error());
        }

        let refreshed: RefreshResponse = response.json()?;

        // The server has revoked the old refresh token by now.
        if let Err(e) = self.tokens.set_access_token(&refreshed.access_token) {
            tracing::warn!(error = %e, "failed to persist refreshed access token");
        }
        if let Some(rotated) = &refreshed.refresh_token {
            if let Err(e) = self.tokens.set_refresh_token(rotated) {
                tracing::warn!(error = %e, "failed to persist rotated refresh token");
            }
        }

        tracing::info!(rotated = refreshed.refresh_token.is_some(), "access token refreshed");
        Ok(refreshed.access_token)
    }

    fn expire(&self) {
        if let Err(e) = self.tokens.clear_session() {
            tracing::warn!(error = %e, "failed to clear session storage");
        }
    }

    /// End the session and return the refresh token that was current, for
    /// server-side revocation.
    ///
    /// Queued waiters return [`ClientError::SessionClosed`]. A refresh already
    /// on the wire is allowed to finish first, so a rotated token is the one
    /// handed back rather than the one it replaced.
    pub async fn close(&self) -> Option<String> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _state = self.refresh_gate.lock().await;
        let refresh_token = self.tokens.refresh_token();
        self.expire();
        tracing::debug!("auth session closed");
        refresh_token
    }

    /// Cancel in-flight refresh waiters but keep the persisted session.
    pub fn shutdown(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("auth session shut down");
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("tokens", &self.tokens)
            .field("epoch", &self.epoch())
            .field("refreshes", &self.refreshes.load(Ordering::SeqCst))
            .finish()
    }
}
