//! Character and spell catalogs
//!
//! This module fetches the public, read-only character and spell listings and
//! maps their loosely-typed records to [`Character`] and [`Spell`].

use app_state::{Character, Spell};
use networking::{HttpClient, HttpError};
use serde::Deserialize;
use std::sync::Arc;
use storage::{CharacterImages, KvError, LocalStore};
use thiserror::Error;

/// Default characters listing
pub const DEFAULT_CHARACTERS_URL: &str = "https://sampleapis.assimilate.be/harrypotter/characters";

/// Default spells listing
pub const DEFAULT_SPELLS_URL: &str = "https://hp-api.onrender.com/api/spells";

/// Catalog error types
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Fetching a listing failed
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Reading local images failed
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),

    /// No record with the requested id
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Catalog endpoints
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Characters listing URL
    pub characters_url: String,
    /// Spells listing URL
    pub spells_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            characters_url: DEFAULT_CHARACTERS_URL.to_string(),
            spells_url: DEFAULT_SPELLS_URL.to_string(),
        }
    }
}

impl CatalogConfig {
    /// Set the characters listing URL
    pub fn with_characters_url(mut self, url: impl Into<String>) -> Self {
        self.characters_url = url.into();
        self
    }

    /// Set the spells listing URL
    pub fn with_spells_url(mut self, url: impl Into<String>) -> Self {
        self.spells_url = url.into();
        self
    }
}

/// Identifier as served upstream: sometimes numeric, sometimes text
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ApiId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for ApiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiId::Number(n) => write!(f, "{}", n),
            ApiId::Text(s) => f.write_str(s),
        }
    }
}

/// Character record from the upstream listing
#[derive(Debug, Clone, Deserialize)]
struct ApiCharacter {
    id: ApiId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    house: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<ApiCharacter> for Character {
    fn from(api: ApiCharacter) -> Self {
        Character {
            id: api.id.to_string(),
            name: api.name.unwrap_or_else(|| "Unknown".to_string()),
            house: api.house.unwrap_or_else(|| "Unknown".to_string()),
            role: api.role,
            description: api.description,
            ..Default::default()
        }
    }
}

/// Client for the character and spell listings
pub struct Catalog {
    http: HttpClient,
    config: CatalogConfig,
    images: Option<Arc<CharacterImages<dyn LocalStore>>>,
}

impl Catalog {
    /// Create a catalog
    pub fn new(http: HttpClient, config: CatalogConfig) -> Self {
        Self { http, config, images: None }
    }

    /// Decorate fetched characters with locally picked images
    pub fn with_images(mut self, images: Arc<CharacterImages<dyn LocalStore>>) -> Self {
        self.images = Some(images);
        self
    }

    /// Fetch all characters
    pub async fn characters(&self) -> Result<Vec<Character>> {
        let records: Vec<ApiCharacter> = self.http.get_json(&self.config.characters_url).await?;
        let mut characters: Vec<Character> = records.into_iter().map(Character::from).collect();
        tracing::debug!(count = characters.len(), "fetched characters");

        if let Some(images) = &self.images {
            match images.all().await {
                Ok(map) => {
                    for character in characters.iter_mut().filter(|c| c.image.is_none()) {
                        character.image = map.get(&character.id).cloned();
                    }
                }
                // images are cosmetic; the listing is still usable
                Err(e) => tracing::warn!(error = %e, "failed to load character images"),
            }
        }

        Ok(characters)
    }

    /// Fetch one character by id
    pub async fn character(&self, id: &str) -> Result<Character> {
        self.characters()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Fetch all spells
    pub async fn spells(&self) -> Result<Vec<Spell>> {
        let spells: Vec<Spell> = self.http.get_json(&self.config.spells_url).await?;
        tracing::debug!(count = spells.len(), "fetched spells");
        Ok(spells)
    }

    /// Fetch one spell by id
    pub async fn spell(&self, id: &str) -> Result<Spell> {
        self.spells()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }
}
