//! Session persistence: a key/value backend plus the token store on top of it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use atrium_auth::CachedUser;

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const USER_KEY: &str = "user";

/// Backend failures, flattened to messages so they can be shared between waiters.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(String),

    #[error("storage contents are not valid JSON: {0}")]
    Format(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Format(err.to_string())
    }
}

/// Minimal string key/value backend for session state.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// JSON-file backed storage. Every mutation is written through to disk.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a truncated file behind.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// Access token, refresh token and cached user, persisted under fixed keys.
///
/// Reads never fail: an unreadable value is logged and treated as absent.
/// Token contents are opaque and never validated here.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "token storage read failed; treating as absent");
                None
            }
        }
    }

    pub fn set_access_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, token)
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn remove_access_token(&self) -> Result<(), StorageError> {
        self.storage.remove(ACCESS_TOKEN_KEY)
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn set_refresh_token(&self, token: &str) -> Result<(), StorageError> {
        self.storage.set(REFRESH_TOKEN_KEY, token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    pub fn remove_refresh_token(&self) -> Result<(), StorageError> {
        self.storage.remove(REFRESH_TOKEN_KEY)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token().is_some()
    }

    /// Remove both tokens. Both removals are attempted even if the first fails.
    pub fn clear_tokens(&self) -> Result<(), StorageError> {
        let access = self.remove_access_token();
        let refresh = self.remove_refresh_token();
        access.and(refresh)
    }

    pub fn set_cached_user(&self, user: &CachedUser) -> Result<(), StorageError> {
        self.storage.set(USER_KEY, &serde_json::to_string(user)?)
    }

    pub fn cached_user(&self) -> Option<CachedUser> {
        let raw = self.read(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "cached user is unreadable; ignoring it");
                None
            }
        }
    }

    pub fn remove_cached_user(&self) -> Result<(), StorageError> {
        self.storage.remove(USER_KEY)
    }

    /// Tokens and cached user.
    pub fn clear_session(&self) -> Result<(), StorageError> {
        let tokens = self.clear_tokens();
        let user = self.remove_cached_user();
        tokens.and(user)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_access_token", &self.has_access_token())
            .field("has_refresh_token", &self.has_refresh_token())
            .finish()
    }
}
