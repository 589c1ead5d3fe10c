//! The `favourite_characters` table
//!
//! One row per `(device_id, character_id)`; rows are inserted on favourite and
//! deleted on un-favourite, never updated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::postgrest::{PostgrestClient, PostgrestRequest};
use crate::{RemoteTableError, Result};

/// Remote table name
pub const FAVOURITE_CHARACTERS_TABLE: &str = "favourite_characters";

const COLUMNS: &str = "device_id,character_id,name,house,image";

/// A favourited character as stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavouriteCharacterRow {
    /// Partition key: the owning installation
    pub device_id: String,
    /// Character identifier
    pub character_id: String,
    /// Display name
    pub name: String,
    /// House, if known
    pub house: Option<String>,
    /// Image URI, if any
    pub image: Option<String>,
}

/// Remote storage for favourite characters
#[async_trait]
pub trait FavouriteCharacterTable: Send + Sync {
    /// All rows belonging to `device_id`
    async fn select_by_device(&self, device_id: &str) -> Result<Vec<FavouriteCharacterRow>>;

    /// Insert one row
    async fn insert(&self, row: &FavouriteCharacterRow) -> Result<()>;

    /// Delete the row keyed by `(device_id, character_id)`
    async fn delete(&self, device_id: &str, character_id: &str) -> Result<()>;
}

/// [`FavouriteCharacterTable`] backed by a PostgREST endpoint
#[derive(Debug, Clone)]
pub struct PostgrestFavouriteTable {
    client: PostgrestClient,
}

impl PostgrestFavouriteTable {
    /// Create a table handle over `client`
    pub fn new(client: PostgrestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FavouriteCharacterTable for PostgrestFavouriteTable {
    async fn select_by_device(&self, device_id: &str) -> Result<Vec<FavouriteCharacterRow>> {
        let request = PostgrestRequest::select(FAVOURITE_CHARACTERS_TABLE, COLUMNS).eq("device_id", device_id);
        let response = self.client.execute(request).await?;
        Ok(response.json()?)
    }

    async fn insert(&self, row: &FavouriteCharacterRow) -> Result<()> {
        let request = PostgrestRequest::insert(FAVOURITE_CHARACTERS_TABLE, row)
            .map_err(RemoteTableError::Serialization)?;
        self.client.execute(request).await?;
        Ok(())
    }

    async fn delete(&self, device_id: &str, character_id: &str) -> Result<()> {
        let request = PostgrestRequest::delete(FAVOURITE_CHARACTERS_TABLE)
            .eq("device_id", device_id)
            .eq("character_id", character_id);
        self.client.execute(request).await?;
        Ok(())
    }
}
