//! Favouritable entities

use remote_table::FavouriteCharacterRow;
use serde::{Deserialize, Serialize};

/// A character that can be favourited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Character {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// House, empty when unknown
    #[serde(default)]
    pub house: String,
    /// Role at school or in the story
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Actor who played the character
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Ancestry (e.g. "half-blood")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestry: Option<String>,
    /// Patronus form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patronus: Option<String>,
    /// Image URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Character {
    /// Create a character with only the required fields set
    pub fn new(id: impl Into<String>, name: impl Into<String>, house: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), house: house.into(), ..Default::default() }
    }

    /// Remote row for this character under `device_id`
    ///
    /// An empty house is stored as `null`.
    pub fn to_row(&self, device_id: &str) -> FavouriteCharacterRow {
        FavouriteCharacterRow {
            device_id: device_id.to_string(),
            character_id: self.id.clone(),
            name: self.name.clone(),
            house: Some(self.house.clone()).filter(|h| !h.is_empty()),
            image: self.image.clone(),
        }
    }
}

impl From<FavouriteCharacterRow> for Character {
    fn from(row: FavouriteCharacterRow) -> Self {
        Self {
            id: row.character_id,
            name: row.name,
            house: row.house.unwrap_or_default(),
            image: row.image,
            ..Default::default()
        }
    }
}

/// A spell that can be favourited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Spell {
    /// Stable identifier
    pub id: String,
    /// Incantation or name
    pub name: String,
    /// What the spell does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Charm, curse, jinx...
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Difficulty rating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

impl Spell {
    /// Create a spell with only the required fields set
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), ..Default::default() }
    }
}
