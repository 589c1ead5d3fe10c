//! End-to-end favourites tests
//!
//! These run the full application wiring over a sled store in a temporary
//! directory and the in-memory remote table.

use app_core::{favourite_rows, CatalogConfig, FavouriteKind};
use app_state::{Character, Spell, ToggleState};
use larry_butter::App;
use remote_table::{FavouriteCharacterRow, InMemoryFavouriteTable};
use std::path::Path;
use std::sync::Arc;
use storage::{KvConfig, KvStore};
use tempfile::TempDir;

fn open_kv(dir: &Path) -> KvStore {
    KvStore::new(KvConfig::new(dir.join("kv").to_string_lossy().to_string())).unwrap()
}

async fn start(dir: &Path, remote: &InMemoryFavouriteTable) -> App {
    App::with_backends(open_kv(dir), Arc::new(remote.clone()), CatalogConfig::default())
        .await
        .unwrap()
}

/// Favouriting a character is immediate and reaches the remote table
#[tokio::test]
async fn test_favourite_character_reaches_remote() {
    let temp_dir = TempDir::new().unwrap();
    let remote = InMemoryFavouriteTable::new();
    let app = start(temp_dir.path(), &remote).await;

    let store = app.favourites();
    assert!(store.is_ready());
    assert!(store.favourites().is_empty());

    let handle = store
        .toggle_favourite(Character::new("42", "Harry Potter", "Gryffindor"))
        .expect("device id is resolved after start");
    assert!(store.is_favourite("42"));

    assert_eq!(handle.wait().await, ToggleState::Committed);
    assert_eq!(
        remote.rows(),
        vec![FavouriteCharacterRow {
            device_id: store.device_id(),
            character_id: "42".to_string(),
            name: "Harry Potter".to_string(),
            house: Some("Gryffindor".to_string()),
            image: None,
        }]
    );

    app.shutdown().await.unwrap();
}

/// Spell favourites and the device id survive a restart; characters come
/// back from the remote table
#[tokio::test]
async fn test_favourites_survive_restart() {
    let temp_dir = TempDir::new().unwrap();
    let remote = InMemoryFavouriteTable::new();

    // Phase 1: favourite a spell and a character
    let device_id = {
        let app = start(temp_dir.path(), &remote).await;
        let store = app.favourites();

        let persisted = store
            .toggle_favourite_spell(Spell::new("s1", "Lumos"))
            .expect("store is ready");
        assert!(persisted.wait().await);

        let toggled = store.toggle_favourite(Character::new("7", "Luna Lovegood", "Ravenclaw")).unwrap();
        assert_eq!(toggled.wait().await, ToggleState::Committed);

        let device_id = store.device_id();
        app.shutdown().await.unwrap();
        device_id
    };

    // Phase 2: restart over the same directory
    {
        let app = start(temp_dir.path(), &remote).await;
        let store = app.favourites();

        assert!(store.is_ready());
        assert_eq!(store.device_id(), device_id);
        assert!(store.is_favourite_spell("s1"));
        assert!(store.is_favourite("7"));
        assert_eq!(store.favourites()[0].house, "Ravenclaw");

        let rows = favourite_rows(store);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, FavouriteKind::Character);
        assert_eq!(rows[0].key(), "character-7");
        assert_eq!(rows[1].key(), "spell-s1");

        app.shutdown().await.unwrap();
    }
}

/// A failed remote insert reverts the optimistic favourite
#[tokio::test]
async fn test_failed_insert_reverts() {
    let temp_dir = TempDir::new().unwrap();
    let remote = InMemoryFavouriteTable::new();
    remote.fail_inserts(true);

    let app = start(temp_dir.path(), &remote).await;
    let store = app.favourites();
    let mut events = store.subscribe();

    let handle = store.toggle_favourite(Character::new("42", "Harry Potter", "Gryffindor")).unwrap();
    assert!(store.is_favourite("42"));

    assert_eq!(handle.wait().await, ToggleState::RolledBack);
    assert!(!store.is_favourite("42"));
    assert!(remote.rows().is_empty());

    let mut rolled_back = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, app_state::FavouritesEvent::RolledBack { ref character_id } if character_id == "42") {
            rolled_back = true;
        }
    }
    assert!(rolled_back);

    app.shutdown().await.unwrap();
}

/// An unreachable remote still yields a ready store with local spells
#[tokio::test]
async fn test_start_with_failing_remote() {
    let temp_dir = TempDir::new().unwrap();

    {
        let app = start(temp_dir.path(), &InMemoryFavouriteTable::new()).await;
        app.favourites()
            .toggle_favourite_spell(Spell::new("s2", "Nox"))
            .unwrap()
            .wait()
            .await;
        app.shutdown().await.unwrap();
    }

    let remote = InMemoryFavouriteTable::new();
    remote.fail_selects(true);
    let app = start(temp_dir.path(), &remote).await;

    assert!(app.favourites().is_ready());
    assert!(app.favourites().favourites().is_empty());
    assert!(app.favourites().is_favourite_spell("s2"));

    app.shutdown().await.unwrap();
}

/// Locally picked character images persist across restarts
#[tokio::test]
async fn test_character_images_persist() {
    let temp_dir = TempDir::new().unwrap();

    {
        let app = start(temp_dir.path(), &InMemoryFavouriteTable::new()).await;
        app.images().set("42", "file:///harry.png").await.unwrap();
        app.shutdown().await.unwrap();
    }

    let app = start(temp_dir.path(), &InMemoryFavouriteTable::new()).await;
    assert_eq!(app.images().get("42").await.unwrap().as_deref(), Some("file:///harry.png"));
    app.shutdown().await.unwrap();
}
