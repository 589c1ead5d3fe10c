//! Larry Butter application wiring
//!
//! Builds the favourites store and the catalogs from environment
//! configuration and owns their lifecycle.
//!
//! # Example
//!
//! ```rust,no_run
//! use larry_butter::{App, AppConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = App::start(AppConfig::from_env()?).await?;
//! println!("{} favourite characters", app.favourites().favourites().len());
//! app.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use app_core::{Catalog, CatalogConfig};
use app_state::FavouritesStore;
use networking::{HttpClient, HttpClientConfig, HttpError};
use remote_table::{FavouriteCharacterTable, PostgrestClient, PostgrestConfig, PostgrestError, PostgrestFavouriteTable};
use std::sync::Arc;
use storage::{CharacterImages, KvConfig, KvError, KvStore, LocalStore, StoredDeviceId};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub use app_core;
pub use app_state;

/// Supabase project URL
pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";
/// Supabase anonymous key
pub const SUPABASE_ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
/// Local storage directory
pub const DATA_DIR_VAR: &str = "LARRY_BUTTER_DATA_DIR";
/// Local storage directory when [`DATA_DIR_VAR`] is unset
pub const DEFAULT_DATA_DIR: &str = "./larry_butter_kv";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
}

/// Startup and shutdown errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local storage could not be opened or flushed
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),

    /// Remote table client could not be built
    #[error("Remote table error: {0}")]
    Remote(#[from] PostgrestError),

    /// Catalog HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
}

/// Result type for application wiring
pub type Result<T> = std::result::Result<T, AppError>;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase anonymous key
    pub supabase_anon_key: String,
    /// Local storage directory
    pub data_dir: String,
    /// Catalog endpoints
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Create a configuration with default storage and catalogs
    pub fn new(supabase_url: impl Into<String>, supabase_anon_key: impl Into<String>) -> Self {
        Self {
            supabase_url: supabase_url.into(),
            supabase_anon_key: supabase_anon_key.into(),
            data_dir: DEFAULT_DATA_DIR.to_string(),
            catalog: CatalogConfig::default(),
        }
    }

    /// Set the local storage directory
    pub fn with_data_dir(mut self, data_dir: impl Into<String>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Set the catalog endpoints
    pub fn with_catalog(mut self, catalog: CatalogConfig) -> Self {
        self.catalog = catalog;
        self
    }

    /// Read configuration from the process environment
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let mut config = Self::new(required(SUPABASE_URL_VAR)?, required(SUPABASE_ANON_KEY_VAR)?);
        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = dir;
        }
        Ok(config)
    }
}

/// Running application: the favourites store plus catalogs
pub struct App {
    kv: KvStore,
    favourites: FavouritesStore,
    catalog: Catalog,
    images: Arc<CharacterImages<dyn LocalStore>>,
}

impl App {
    /// Open storage, connect the remote table and load favourites
    pub async fn start(config: AppConfig) -> Result<Self> {
        let kv = KvStore::new(KvConfig::new(config.data_dir.clone()))?;
        let client = PostgrestClient::new(PostgrestConfig::new(&config.supabase_url, &config.supabase_anon_key))?;
        let remote: Arc<dyn FavouriteCharacterTable> = Arc::new(PostgrestFavouriteTable::new(client));

        Self::with_backends(kv, remote, config.catalog).await
    }

    /// Start over an already opened store and remote table
    pub async fn with_backends(
        kv: KvStore,
        remote: Arc<dyn FavouriteCharacterTable>,
        catalog: CatalogConfig,
    ) -> Result<Self> {
        let local: Arc<dyn LocalStore> = Arc::new(kv.clone());
        let identity = Arc::new(StoredDeviceId::new(Arc::clone(&local)));
        let images = Arc::new(CharacterImages::new(Arc::clone(&local)));

        let http = HttpClient::new(HttpClientConfig::default())?;
        let catalog = Catalog::new(http, catalog).with_images(Arc::clone(&images));

        let favourites = FavouritesStore::new(local, remote, identity);
        favourites.init().await;
        tracing::info!(device_id = %favourites.device_id(), "application started");

        Ok(Self { kv, favourites, catalog, images })
    }

    /// The favourites store; clone it to share with other tasks
    pub fn favourites(&self) -> &FavouritesStore {
        &self.favourites
    }

    /// Character and spell catalogs
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Locally picked character images
    pub fn images(&self) -> &Arc<CharacterImages<dyn LocalStore>> {
        &self.images
    }

    /// Wait for pending writes and flush local storage
    pub async fn shutdown(self) -> Result<()> {
        self.favourites.dispose().await;
        self.kv.flush()?;
        tracing::info!("application stopped");
        Ok(())
    }
}

/// Command-line actions of the `larry-butter` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// List favourite characters and spells
    Favourites,
    /// List catalog characters, marking favourites
    Characters,
    /// List catalog spells, marking favourites
    Spells,
}

impl std::str::FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "favourites" => Ok(Command::Favourites),
            "characters" => Ok(Command::Characters),
            "spells" => Ok(Command::Spells),
            other => Err(format!("unknown command: {other} (expected favourites, characters or spells)")),
        }
    }
}

/// Install the global `tracing` subscriber
///
/// Honours `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
