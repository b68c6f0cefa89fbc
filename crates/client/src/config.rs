use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// Where the API lives and where the session is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// JSON file holding tokens and the cached user. `None` keeps them in memory.
    pub token_file: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token_file: None,
        }
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    /// `ATRIUM_API_URL` and `ATRIUM_TOKEN_FILE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            base_url: lookup("ATRIUM_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token_file: lookup("ATRIUM_TOKEN_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
