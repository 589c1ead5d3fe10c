//! Locally picked character images
//!
//! Maps character ids to image URIs, stored as one JSON object under
//! [`CHARACTER_IMAGES_KEY`].

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::kv::{get_json, set_json, LocalStore, Result};

/// Storage key holding the image map
pub const CHARACTER_IMAGES_KEY: &str = "character_images_v1";

/// Image URIs chosen on this device, keyed by character id
pub struct CharacterImages<S: ?Sized> {
    store: Arc<S>,
    // serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl<S: LocalStore + ?Sized> CharacterImages<S> {
    /// Create an image map over `store`
    pub fn new(store: Arc<S>) -> Self {
        Self { store, write_lock: Mutex::new(()) }
    }

    /// Image URI for one character
    pub async fn get(&self, character_id: &str) -> Result<Option<String>> {
        Ok(self.all().await?.remove(character_id))
    }

    /// The whole id → URI map (empty if nothing was stored)
    pub async fn all(&self) -> Result<HashMap<String, String>> {
        Ok(get_json(self.store.as_ref(), CHARACTER_IMAGES_KEY).await?.unwrap_or_default())
    }

    /// Associate `uri` with `character_id`, replacing any previous image
    pub async fn set(&self, character_id: &str, uri: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut map = self.all().await?;
        map.insert(character_id.to_string(), uri.to_string());
        set_json(self.store.as_ref(), CHARACTER_IMAGES_KEY, &map).await
    }
}
