use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use atrium_core::UserId;

use crate::Role;

/// Access-token claims (transport-agnostic).
///
/// Timestamps are encoded as unix seconds so the token stays a standard JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Role at the time the token was minted.
    pub role: Role,

    /// Issued-at timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate access-token claims.
///
/// Signature verification happens in [`crate::tokens`]; this checks the time
/// window only.
pub fn validate_claims(claims: &AccessClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(iat: DateTime<Utc>, exp: DateTime<Utc>) -> AccessClaims {
        AccessClaims {
            sub: UserId::new(),
            role: Role::Member,
            iat,
            exp,
        }
    }

    #[test]
    fn window_checks() {
        let now = Utc::now();
        assert_eq!(validate_claims(&claims(now, now + Duration::minutes(5)), now), Ok(()));
        assert_eq!(
            validate_claims(&claims(now - Duration::minutes(10), now - Duration::minutes(5)), now),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(now + Duration::minutes(1), now + Duration::minutes(5)), now),
            Err(TokenValidationError::NotYetValid)
        );
        assert_eq!(
            validate_claims(&claims(now, now), now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let c = claims(now - Duration::minutes(1), now);
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::Expired));
    }
}
