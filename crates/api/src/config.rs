//! Process configuration, read from the environment.

use chrono::Duration;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

/// Credentials of the admin account created at startup when no user exists.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// When set, the history log is stored in Postgres.
    pub database_url: Option<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ApiConfig {
    /// In-memory configuration with default TTLs.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            jwt_secret: jwt_secret.into(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_token_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            database_url: None,
            bootstrap_admin: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });

        let mut config = Self::new(jwt_secret);

        if let Some(addr) = lookup("ATRIUM_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(ttl) = lookup("ACCESS_TOKEN_TTL_SECS") {
            config.access_token_ttl = Duration::seconds(parse_secs("ACCESS_TOKEN_TTL_SECS", ttl)?);
        }
        if let Some(ttl) = lookup("REFRESH_TOKEN_TTL_SECS") {
            config.refresh_token_ttl = Duration::seconds(parse_secs("REFRESH_TOKEN_TTL_SECS", ttl)?);
        }
        config.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        config.bootstrap_admin = match (lookup("ATRIUM_ADMIN_EMAIL"), lookup("ATRIUM_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete("ATRIUM_ADMIN_EMAIL", "ATRIUM_ADMIN_PASSWORD")),
        };

        Ok(config)
    }
}

fn parse_secs(name: &'static str, value: String) -> Result<i64, ConfigError> {
    match value.trim().parse::<i64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidNumber { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.jwt_secret, "dev-secret");
        assert_eq!(config.access_token_ttl, Duration::minutes(15));
        assert!(config.database_url.is_none());
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("ACCESS_TOKEN_TTL_SECS", "60"),
            ("DATABASE_URL", "postgres://localhost/atrium"),
            ("ATRIUM_ADMIN_EMAIL", "admin@example.com"),
            ("ATRIUM_ADMIN_PASSWORD", "correct horse"),
        ]))
        .unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.access_token_ttl, Duration::seconds(60));
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/atrium"));
        assert_eq!(config.bootstrap_admin.unwrap().email, "admin@example.com");
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            ApiConfig::from_lookup(lookup(&[("ACCESS_TOKEN_TTL_SECS", "-5")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            ApiConfig::from_lookup(lookup(&[("ATRIUM_ADMIN_EMAIL", "a@example.com")])),
            Err(ConfigError::Incomplete(..))
        ));
    }
}
