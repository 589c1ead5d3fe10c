//! Per-installation device identity
//!
//! The device identifier partitions remote favourites per installation. It is
//! created lazily on first need, persisted under [`DEVICE_ID_KEY`] and never
//! regenerated once present.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::kv::{KvError, LocalStore};

/// Storage key holding the device identifier
pub const DEVICE_ID_KEY: &str = "deviceId";

/// Device identity errors
#[derive(Debug, Error)]
pub enum DeviceIdError {
    /// Reading or persisting the identifier failed
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),
}

/// Result type for device identity operations
pub type Result<T> = std::result::Result<T, DeviceIdError>;

/// Source of a stable, opaque per-installation identifier
#[async_trait]
pub trait DeviceIdProvider: Send + Sync {
    /// Return the device identifier, creating and persisting it if absent
    async fn device_id(&self) -> Result<String>;
}

/// [`DeviceIdProvider`] that keeps the identifier in a [`LocalStore`]
pub struct StoredDeviceId<S: ?Sized> {
    store: Arc<S>,
    resolved: OnceCell<String>,
}

impl<S: LocalStore + ?Sized> StoredDeviceId<S> {
    /// Create a provider over `store`
    pub fn new(store: Arc<S>) -> Self {
        Self { store, resolved: OnceCell::new() }
    }

    async fn load_or_create(&self) -> Result<String> {
        if let Some(existing) = self.store.get_item(DEVICE_ID_KEY).await? {
            if !existing.is_empty() {
                return Ok(existing);
            }
        }

        let id = generate_device_id();
        self.store.set_item(DEVICE_ID_KEY, &id).await?;
        tracing::info!(device_id = %id, "generated new device identifier");
        Ok(id)
    }
}

#[async_trait]
impl<S: LocalStore + ?Sized> DeviceIdProvider for StoredDeviceId<S> {
    async fn device_id(&self) -> Result<String> {
        self.resolved
            .get_or_try_init(|| self.load_or_create())
            .await
            .cloned()
    }
}

/// Generate a fresh identifier of the form `dev-<unix millis>-<random hex>`
pub fn generate_device_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let random = Uuid::new_v4().simple().to_string();
    format!("dev-{}-{}", millis, &random[..12])
}
