//! Server-side refresh-token lifecycle.
//!
//! Tokens rotate on every use: a successful refresh revokes the presented
//! token and issues a new one. Presenting an already-rotated token is treated
//! as theft and revokes every live token of that user.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use atrium_auth::generate_refresh_token;
use atrium_core::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshTokenError {
    #[error("refresh token is not recognised")]
    Unknown,

    #[error("refresh token has expired")]
    Expired,

    #[error("refresh token has been revoked")]
    Revoked,

    #[error("failed to issue refresh token: {0}")]
    Issue(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

pub trait RefreshTokenStore: Send + Sync {
    /// Mint a new token for `user_id`.
    fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, RefreshTokenError>;

    /// Exchange `token` for a new one. Returns the owning user and the new token.
    fn rotate(&self, token: &str, now: DateTime<Utc>) -> Result<(UserId, String), RefreshTokenError>;

    /// Revoke one token. Returns `false` if it was unknown or already revoked.
    fn revoke(&self, token: &str, now: DateTime<Utc>) -> bool;

    /// Revoke every live token of a user; returns how many were revoked.
    fn revoke_all(&self, user_id: UserId, now: DateTime<Utc>) -> usize;
}

/// In-memory refresh-token store.
#[derive(Debug)]
pub struct InMemoryRefreshTokenStore {
    ttl: Duration,
    tokens: RwLock<HashMap<String, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    fn insert_new(
        &self,
        tokens: &mut HashMap<String, RefreshTokenRecord>,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<String, RefreshTokenError> {
        let token = generate_refresh_token().map_err(|e| RefreshTokenError::Issue(e.to_string()))?;
        tokens.insert(
            token.clone(),
            RefreshTokenRecord {
                user_id,
                issued_at: now,
                expires_at: now + self.ttl,
                revoked_at: None,
            },
        );
        Ok(token)
    }

    fn revoke_all_locked(
        tokens: &mut HashMap<String, RefreshTokenRecord>,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> usize {
        let mut revoked = 0;
        for record in tokens.values_mut() {
            if record.user_id == user_id && record.revoked_at.is_none() {
                record.revoked_at = Some(now);
                revoked += 1;
            }
        }
        revoked
    }
}

impl RefreshTokenStore for InMemoryRefreshTokenStore {
    fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, RefreshTokenError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| RefreshTokenError::Issue("lock poisoned".to_string()))?;

        // Expired records can no longer be rotated or reused; drop them.
        tokens.retain(|_, record| now < record.expires_at);

        self.insert_new(&mut tokens, user_id, now)
    }

    fn rotate(&self, token: &str, now: DateTime<Utc>) -> Result<(UserId, String), RefreshTokenError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| RefreshTokenError::Issue("lock poisoned".to_string()))?;

        let record = tokens.get(token).cloned().ok_or(RefreshTokenError::Unknown)?;

        if record.revoked_at.is_some() {
            let revoked = Self::revoke_all_locked(&mut tokens, record.user_id, now);
            tracing::warn!(
                user_id = %record.user_id,
                revoked,
                "revoked refresh token presented again; revoking all tokens of user"
            );
            return Err(RefreshTokenError::Revoked);
        }
        if !record.is_live(now) {
            return Err(RefreshTokenError::Expired);
        }

        if let Some(old) = tokens.get_mut(token) {
            old.revoked_at = Some(now);
        }
        let next = self.insert_new(&mut tokens, record.user_id, now)?;
        Ok((record.user_id, next))
    }

    fn revoke(&self, token: &str, now: DateTime<Utc>) -> bool {
        let Ok(mut tokens) = self.tokens.write() else {
            return false;
        };
        match tokens.get_mut(token) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(now);
                true
            }
            _ => false,
        }
    }

    fn revoke_all(&self, user_id: UserId, now: DateTime<Utc>) -> usize {
        match self.tokens.write() {
            Ok(mut tokens) => Self::revoke_all_locked(&mut tokens, user_id, now),
            Err(_) => 0,
        }
    }
}
