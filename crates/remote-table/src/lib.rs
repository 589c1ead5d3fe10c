//! Remote favourites table for Larry Butter
//!
//! This crate provides a PostgREST (Supabase REST) client and the
//! `favourite_characters` table built on it, plus an in-memory implementation
//! of the same table.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod postgrest;
pub mod table;

pub use memory::InMemoryFavouriteTable;
pub use postgrest::{PostgrestClient, PostgrestConfig, PostgrestError};
pub use table::{
    FavouriteCharacterRow, FavouriteCharacterTable, PostgrestFavouriteTable,
    FAVOURITE_CHARACTERS_TABLE,
};

/// Result type for remote table operations
pub type Result<T> = std::result::Result<T, RemoteTableError>;

/// Error types for remote table operations
#[derive(Debug, thiserror::Error)]
pub enum RemoteTableError {
    /// The endpoint rejected the request or could not be reached
    #[error("{0}")]
    Postgrest(#[from] PostgrestError),

    /// Row could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RemoteTableError {
    /// Whether the failure was a connectivity problem
    pub fn is_network_error(&self) -> bool {
        matches!(self, RemoteTableError::Postgrest(e) if e.is_network_error())
    }
}
