//! Key-value store for locally persisted app data
//!
//! This module provides the string-keyed, string-valued local storage used for
//! favourite spells, the device identifier and picked character images. The
//! default backend is sled; anything implementing [`LocalStore`] can stand in.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sled::Db;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Key-value store error types
#[derive(Debug, Error)]
pub enum KvError {
    /// Sled database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored bytes are not valid UTF-8
    #[error("Invalid value for key {0}: not UTF-8")]
    InvalidValue(String),

    /// Backend unavailable or refused the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for key-value operations
pub type Result<T> = std::result::Result<T, KvError>;

/// Asynchronous string key-value storage
///
/// Values are opaque strings; callers that store structured data encode it as
/// JSON themselves (see [`get_json`] and [`set_json`]).
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// Read a JSON-encoded value from a [`LocalStore`]
pub async fn get_json<T, S>(store: &S, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: LocalStore + ?Sized,
{
    match store.get_item(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Write a value to a [`LocalStore`] as JSON
pub async fn set_json<T, S>(store: &S, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    S: LocalStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;
    store.set_item(key, &raw).await
}

/// Key-value store configuration
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// Database path
    pub path: String,
    /// Cache capacity in bytes
    pub cache_capacity: u64,
    /// Enable compression
    pub use_compression: bool,
    /// Flush interval in milliseconds (None for immediate flush)
    pub flush_every_ms: Option<u64>,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            path: "larry_butter_kv".to_string(),
            cache_capacity: 8 * 1024 * 1024, // 8MB
            use_compression: true,
            flush_every_ms: Some(500),
        }
    }
}

impl KvConfig {
    /// Create a new configuration with a custom path
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set cache capacity in bytes
    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Enable or disable compression
    pub fn use_compression(mut self, enabled: bool) -> Self {
        self.use_compression = enabled;
        self
    }

    /// Set flush interval in milliseconds
    pub fn flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }
}

/// Sled-backed key-value store
#[derive(Clone)]
pub struct KvStore {
    db: Arc<Db>,
}

impl KvStore {
    /// Open (or create) a key-value store on disk
    pub fn new(config: KvConfig) -> Result<Self> {
        let mut db_config = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity)
            .use_compression(config.use_compression);

        if let Some(ms) = config.flush_every_ms {
            db_config = db_config.flush_every_ms(Some(ms));
        }

        let db = db_config.open()?;
        tracing::debug!(path = %config.path, "opened key-value store");

        Ok(Self { db: Arc::new(db) })
    }

    /// Create an in-memory key-value store (for testing)
    pub fn in_memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get the raw string stored under `key`
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| KvError::InvalidValue(key.to_string())),
            None => Ok(None),
        }
    }

    /// Store a raw string under `key`
    pub fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl LocalStore for KvStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.get_raw(key)
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.set_raw(key, value)
    }
}

/// Volatile [`LocalStore`] backed by a map
///
/// Writes can be made to fail on demand, which makes it convenient for
/// exercising error paths.
#[derive(Default, Clone)]
pub struct MemoryStore {
    items: Arc<RwLock<HashMap<String, String>>>,
    fail_writes: Arc<std::sync::atomic::AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `items`
    pub fn with_items<K, V>(items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = items.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { items: Arc::new(RwLock::new(map)), ..Default::default() }
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(KvError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.items.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
