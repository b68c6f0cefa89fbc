//! Token minting and verification.
//!
//! Access tokens are HS256 JWTs over [`AccessClaims`]. Refresh tokens are
//! opaque random strings; their lifecycle lives with whatever store persists
//! them.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use atrium_core::UserId;

use crate::{AccessClaims, Role, TokenValidationError, validate_claims};

/// Bytes of entropy in a refresh token.
const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum TokenIssueError {
    #[error("failed to sign access token: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),

    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}

/// Verifies bearer tokens presented to the API.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenValidationError>;
}

/// HS256 access-token codec sharing one secret for signing and verification.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256Jwt {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        // Time-window checks are done by `validate_claims` so they are exact
        // (no library leeway).
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(
        &self,
        user_id: UserId,
        role: Role,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenIssueError> {
        let claims = AccessClaims {
            sub: user_id,
            role,
            iat: now,
            exp: now + ttl,
        };
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// Generate a fresh opaque refresh token (256 bits, base64url without padding).
pub fn generate_refresh_token() -> Result<String, TokenIssueError> {
    let mut buf = [0u8; REFRESH_TOKEN_BYTES];
    getrandom::getrandom(&mut buf).map_err(|e| TokenIssueError::Entropy(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}
