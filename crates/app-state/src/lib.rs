//! Application state management for Larry Butter
//!
//! This crate provides the favourites state container with optimistic updates,
//! compare-and-rollback on remote failure, and local persistence of spells.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod favourites;
pub mod models;
pub mod toggle;

pub use favourites::{FavouritesEvent, FavouritesStore, FAVOURITE_SPELLS_KEY};
pub use models::{Character, Spell};
pub use toggle::{PersistHandle, ToggleHandle, ToggleState};
