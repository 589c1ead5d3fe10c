//! Storage layer for Larry Butter
//!
//! This crate provides local key-value storage, the per-installation device
//! identity and the locally picked character images.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod character_images;
pub mod device;
pub mod kv;

pub use character_images::{CharacterImages, CHARACTER_IMAGES_KEY};
pub use device::{DeviceIdError, DeviceIdProvider, StoredDeviceId, DEVICE_ID_KEY};
pub use kv::{get_json, set_json, KvConfig, KvError, KvStore, LocalStore, MemoryStore};
