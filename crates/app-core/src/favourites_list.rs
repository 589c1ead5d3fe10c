//! Flattened favourites listing for display

use app_state::{Character, FavouritesStore, Spell};
use std::fmt;

/// Kind of favourited entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FavouriteKind {
    /// A character
    Character,
    /// A spell
    Spell,
}

impl fmt::Display for FavouriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FavouriteKind::Character => f.write_str("character"),
            FavouriteKind::Spell => f.write_str("spell"),
        }
    }
}

/// One row in the favourites listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavouriteRow {
    /// Entity kind
    pub kind: FavouriteKind,
    /// Entity id
    pub id: String,
    /// Primary text
    pub title: String,
    /// Secondary text
    pub subtitle: String,
}

impl FavouriteRow {
    /// Key unique across kinds, e.g. `character-42`
    pub fn key(&self) -> String {
        format!("{}-{}", self.kind, self.id)
    }
}

impl From<&Character> for FavouriteRow {
    fn from(character: &Character) -> Self {
        let subtitle = if character.house.is_empty() {
            "Character".to_string()
        } else {
            format!("House: {}", character.house)
        };
        Self {
            kind: FavouriteKind::Character,
            id: character.id.clone(),
            title: character.name.clone(),
            subtitle,
        }
    }
}

impl From<&Spell> for FavouriteRow {
    fn from(spell: &Spell) -> Self {
        Self {
            kind: FavouriteKind::Spell,
            id: spell.id.clone(),
            title: spell.name.clone(),
            subtitle: spell
                .description
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "Spell".to_string()),
        }
    }
}

/// Build the listing: characters first, then spells, each in store order
pub fn favourite_rows(store: &FavouritesStore) -> Vec<FavouriteRow> {
    store
        .favourites()
        .iter()
        .map(FavouriteRow::from)
        .chain(store.favourite_spells().iter().map(FavouriteRow::from))
        .collect()
}
