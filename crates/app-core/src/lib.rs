//! Core application logic for Larry Butter
//!
//! This crate sits on top of the favourites store and provides the catalog
//! listings the app browses and the flattened favourites view.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod favourites_list;

pub use catalog::{Catalog, CatalogConfig, CatalogError};
pub use favourites_list::{favourite_rows, FavouriteKind, FavouriteRow};
