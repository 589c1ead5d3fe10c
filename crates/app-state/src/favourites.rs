//! Favourite characters and spells
//!
//! [`FavouritesStore`] is the process-wide owner of the favourites lists. The
//! in-memory lists are authoritative for reads while the process lives; local
//! storage (spells) and the remote table (characters) are only consulted when
//! the store is initialized.
//!
//! Toggles update memory synchronously and hand persistence to a background
//! task. Character toggles are written remotely once, without retry, and are
//! rolled back if that write fails. Spell toggles only touch local storage.

use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, Mutex, Notify};

use remote_table::FavouriteCharacterTable;
use storage::{set_json, DeviceIdProvider, LocalStore};

use crate::models::{Character, Spell};
use crate::toggle::{
    CharacterToggle, PersistHandle, RemoteWrite, RollbackDecision, ToggleHandle, ToggleState,
};

/// Storage key holding favourite spells
pub const FAVOURITE_SPELLS_KEY: &str = "favouriteSpells";

const EVENT_CAPACITY: usize = 64;

/// Change notifications emitted by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavouritesEvent {
    /// Initial load finished (successfully or not)
    Ready,

    /// Character favourites changed
    CharactersChanged,

    /// Spell favourites changed
    SpellsChanged,

    /// A failed remote write reverted a character toggle
    RolledBack {
        /// The affected character
        character_id: String,
    },
}

#[derive(Debug, Default)]
struct FavouritesState {
    device_id: String,
    characters: Vec<Character>,
    spells: Vec<Spell>,
}

impl FavouritesState {
    fn has_character(&self, id: &str) -> bool {
        self.characters.iter().any(|c| c.id == id)
    }

    fn has_spell(&self, id: &str) -> bool {
        self.spells.iter().any(|s| s.id == id)
    }
}

struct Inner {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn FavouriteCharacterTable>,
    identity: Arc<dyn DeviceIdProvider>,

    state: RwLock<FavouritesState>,
    initialized: Mutex<bool>,
    ready: AtomicBool,
    disposed: AtomicBool,

    // serializes spell snapshots so the last write carries the newest list
    spell_write: Mutex<()>,

    in_flight: AtomicUsize,
    idle: Notify,

    events: broadcast::Sender<FavouritesEvent>,
}

impl Inner {
    fn emit(&self, event: FavouritesEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Register a unit of background work, or `None` once disposed
    ///
    /// The counter is raised before `disposed` is read, so `dispose` either
    /// sees the work or the caller sees the flag.
    fn begin_task(self: &Arc<Self>) -> Option<InFlight> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(Arc::clone(self));
        if self.disposed.load(Ordering::SeqCst) {
            return None;
        }
        Some(guard)
    }
}

/// Decrements the in-flight counter even if the task panics
struct InFlight(Arc<Inner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Process-wide favourites state container
///
/// Cloning is cheap and yields a handle to the same store.
#[derive(Clone)]
pub struct FavouritesStore {
    inner: Arc<Inner>,
}

impl FavouritesStore {
    /// Create a store; nothing is loaded until [`FavouritesStore::init`]
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn FavouriteCharacterTable>,
        identity: Arc<dyn DeviceIdProvider>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                local,
                remote,
                identity,
                state: RwLock::new(FavouritesState::default()),
                initialized: Mutex::new(false),
                ready: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                spell_write: Mutex::new(()),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                events,
            }),
        }
    }

    /// Load persisted favourites
    ///
    /// Runs once per store; later calls return immediately. Every failure is
    /// logged and the store becomes ready regardless, falling back to empty
    /// lists. Spells toggled before the load finished are merged after the
    /// stored ones and the result is saved.
    pub async fn init(&self) {
        let mut initialized = self.inner.initialized.lock().await;
        if *initialized {
            return;
        }
        *initialized = true;

        let device_id = match self.inner.identity.device_id().await {
            Ok(id) => {
                self.inner.state.write().device_id = id.clone();
                Some(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to resolve device identity");
                None
            }
        };

        let stored_spells = self.load_spells().await;
        {
            // spells toggled before the load are kept on top of the stored list
            let mut state = self.inner.state.write();
            let pending = std::mem::take(&mut state.spells);
            state.spells = dedup_by_id(stored_spells.iter().cloned().chain(pending).collect(), |s| &s.id);
        }

        if let Some(device_id) = device_id {
            self.load_characters(&device_id).await;
        }

        self.inner.ready.store(true, Ordering::SeqCst);
        let (characters, spells, drifted) = {
            let state = self.inner.state.read();
            (state.characters.len(), state.spells.len(), state.spells != stored_spells)
        };
        tracing::info!(characters, spells, "favourites ready");

        if drifted {
            if let Some(guard) = self.inner.begin_task() {
                tracing::debug!(key = FAVOURITE_SPELLS_KEY, "saving spells toggled during load");
                self.persist_spells(guard);
            }
        }
        self.inner.emit(FavouritesEvent::Ready);
    }

    async fn load_spells(&self) -> Vec<Spell> {
        let raw = match self.inner.local.get_item(FAVOURITE_SPELLS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, key = FAVOURITE_SPELLS_KEY, "failed to read favourite spells");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Spell>>(&raw) {
            Ok(spells) => dedup_by_id(spells, |s| &s.id),
            Err(e) => {
                tracing::warn!(error = %e, key = FAVOURITE_SPELLS_KEY, "malformed favourite spells, starting empty");
                Vec::new()
            }
        }
    }

    async fn load_characters(&self, device_id: &str) {
        match self.inner.remote.select_by_device(device_id).await {
            Ok(rows) => {
                let characters: Vec<Character> = rows.into_iter().map(Character::from).collect();
                self.inner.state.write().characters = dedup_by_id(characters, |c| &c.id);
            }
            Err(e) => {
                tracing::error!(error = %e, device_id, "failed to load favourite characters");
            }
        }
    }

    /// Wait for in-flight persistence and stop accepting toggles
    pub async fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);

        loop {
            let idle = self.inner.idle.notified();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            idle.await;
        }

        tracing::debug!("favourites store disposed");
    }

    /// Whether the initial load has finished
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// The resolved device identifier, empty until resolved
    pub fn device_id(&self) -> String {
        self.inner.state.read().device_id.clone()
    }

    /// Snapshot of favourite characters in insertion order
    pub fn favourites(&self) -> Vec<Character> {
        self.inner.state.read().characters.clone()
    }

    /// Snapshot of favourite spells in insertion order
    pub fn favourite_spells(&self) -> Vec<Spell> {
        self.inner.state.read().spells.clone()
    }

    /// Whether the character with `id` is a favourite
    pub fn is_favourite(&self, id: &str) -> bool {
        self.inner.state.read().has_character(id)
    }

    /// Whether the spell with `id` is a favourite
    pub fn is_favourite_spell(&self, id: &str) -> bool {
        self.inner.state.read().has_spell(id)
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<FavouritesEvent> {
        self.inner.events.subscribe()
    }

    /// Flip a character's favourite membership
    ///
    /// The change is visible as soon as this returns. The remote write runs in
    /// the background; if it fails the change is reverted unless a newer toggle
    /// already moved membership again. Returns `None` (and does nothing) while
    /// the device identity is unresolved or after disposal.
    pub fn toggle_favourite(&self, character: Character) -> Option<ToggleHandle> {
        let guard = self.inner.begin_task()?;

        let (device_id, existed) = {
            let mut state = self.inner.state.write();
            if state.device_id.is_empty() {
                tracing::debug!(character_id = %character.id, "ignoring toggle before device identity is known");
                return None;
            }

            let existed = state.has_character(&character.id);
            if existed {
                state.characters.retain(|c| c.id != character.id);
            } else {
                state.characters.push(character.clone());
            }
            (state.device_id.clone(), existed)
        };
        self.inner.emit(FavouritesEvent::CharactersChanged);

        let (tx, rx) = oneshot::channel();
        let handle = ToggleHandle::new(character.id.clone(), rx);
        let mut toggle = CharacterToggle::new(character, existed);
        let inner = Arc::clone(&self.inner);

        spawn_tracked(guard, async move {
            let result = match toggle.remote_write(&device_id) {
                RemoteWrite::Insert(row) => inner.remote.insert(&row).await,
                RemoteWrite::Delete { device_id, character_id } => {
                    inner.remote.delete(&device_id, &character_id).await
                }
            };

            if let Err(e) = &result {
                tracing::warn!(
                    error = %e,
                    character_id = %toggle.character.id,
                    existed = toggle.existed,
                    "remote favourite write failed"
                );
            }

            let state = toggle.settle(result.is_ok());
            if state == ToggleState::RolledBack {
                rollback(&inner, &toggle);
            }
            let _ = tx.send(state);
        });

        Some(handle)
    }

    /// Flip a spell's favourite membership
    ///
    /// The change is visible as soon as this returns. Once the store is ready,
    /// the full spell list is rewritten to local storage in the background; the
    /// returned handle reports that write. Returns `None` when no write was
    /// scheduled: after disposal, or before the initial load, in which case
    /// [`FavouritesStore::init`] saves the list once it has merged it with
    /// the stored one.
    pub fn toggle_favourite_spell(&self, spell: Spell) -> Option<PersistHandle> {
        let guard = self.inner.begin_task()?;

        {
            let mut state = self.inner.state.write();
            if state.has_spell(&spell.id) {
                state.spells.retain(|s| s.id != spell.id);
            } else {
                state.spells.push(spell);
            }
        }
        self.inner.emit(FavouritesEvent::SpellsChanged);

        if !self.is_ready() {
            return None;
        }
        Some(self.persist_spells(guard))
    }

    fn persist_spells(&self, guard: InFlight) -> PersistHandle {
        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);

        spawn_tracked(guard, async move {
            let _write = inner.spell_write.lock().await;
            let snapshot = inner.state.read().spells.clone();

            let result = set_json(inner.local.as_ref(), FAVOURITE_SPELLS_KEY, &snapshot).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, key = FAVOURITE_SPELLS_KEY, "failed to save favourite spells");
            }
            let _ = tx.send(result.is_ok());
        });

        PersistHandle::new(rx)
    }

}

fn spawn_tracked<F>(guard: InFlight, task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let _guard = guard;
        task.await;
    });
}

fn rollback(inner: &Inner, toggle: &CharacterToggle) {
    let id = &toggle.character.id;
    let decision = {
        let mut state = inner.state.write();
        let decision = RollbackDecision::decide(toggle.existed, state.has_character(id));
        match decision {
            RollbackDecision::Restore => state.characters.push(toggle.character.clone()),
            RollbackDecision::Remove => state.characters.retain(|c| &c.id != id),
            RollbackDecision::Skip => {}
        }
        decision
    };

    if decision == RollbackDecision::Skip {
        tracing::debug!(character_id = %id, "newer toggle superseded rollback");
        return;
    }

    tracing::info!(character_id = %id, ?decision, "rolled back favourite toggle");
    inner.emit(FavouritesEvent::CharactersChanged);
    inner.emit(FavouritesEvent::RolledBack { character_id: id.clone() });
}

fn dedup_by_id<T>(items: Vec<T>, id: impl Fn(&T) -> &String) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(id(item).clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use remote_table::{FavouriteCharacterRow, InMemoryFavouriteTable};
    use storage::{DeviceIdError, KvError, MemoryStore};

    struct FixedDevice(&'static str);

    #[async_trait]
    impl DeviceIdProvider for FixedDevice {
        async fn device_id(&self) -> storage::device::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenDevice;

    #[async_trait]
    impl DeviceIdProvider for BrokenDevice {
        async fn device_id(&self) -> storage::device::Result<String> {
            Err(DeviceIdError::Storage(KvError::Unavailable("keychain locked".to_string())))
        }
    }

    mockall::mock! {
        Table {}

        #[async_trait]
        impl FavouriteCharacterTable for Table {
            async fn select_by_device(&self, device_id: &str) -> remote_table::Result<Vec<FavouriteCharacterRow>>;
            async fn insert(&self, row: &FavouriteCharacterRow) -> remote_table::Result<()>;
            async fn delete(&self, device_id: &str, character_id: &str) -> remote_table::Result<()>;
        }
    }

    fn harry() -> Character {
        Character::new("42", "Harry Potter", "Gryffindor")
    }

    fn lumos() -> Spell {
        Spell::new("s1", "Lumos")
    }

    async fn ready_store(local: MemoryStore, remote: InMemoryFavouriteTable) -> FavouritesStore {
        let store = FavouritesStore::new(Arc::new(local), Arc::new(remote), Arc::new(FixedDevice("dev-1")));
        store.init().await;
        store
    }

    #[tokio::test]
    async fn test_init_empty() {
        let store = ready_store(MemoryStore::new(), InMemoryFavouriteTable::new()).await;

        assert!(store.is_ready());
        assert_eq!(store.device_id(), "dev-1");
        assert!(store.favourites().is_empty());
        assert!(store.favourite_spells().is_empty());
    }

    #[tokio::test]
    async fn test_init_loads_both_sources() {
        let local = MemoryStore::with_items([(FAVOURITE_SPELLS_KEY, r#"[{"id":"s1","name":"Lumos"}]"#)]);
        let remote = InMemoryFavouriteTable::with_rows(vec![
            harry().to_row("dev-1"),
            Character::new("7", "Luna Lovegood", "Ravenclaw").to_row("other-device"),
        ]);

        let store = ready_store(local, remote).await;

        assert!(store.is_favourite("42"));
        assert!(!store.is_favourite("7"));
        assert!(store.is_favourite_spell("s1"));
        assert_eq!(store.favourites()[0].house, "Gryffindor");
    }

    #[tokio::test]
    async fn test_init_runs_once() {
        let remote = InMemoryFavouriteTable::new();
        let store = ready_store(MemoryStore::new(), remote.clone()).await;

        store.init().await;
        assert_eq!(remote.select_calls(), 1);
    }

    #[tokio::test]
    async fn test_init_survives_malformed_spells() {
        let local = MemoryStore::with_items([(FAVOURITE_SPELLS_KEY, "{oops")]);
        let remote = InMemoryFavouriteTable::with_rows(vec![harry().to_row("dev-1")]);

        let store = ready_store(local, remote).await;

        assert!(store.is_ready());
        assert!(store.favourite_spells().is_empty());
        assert!(store.is_favourite("42"));
    }

    #[tokio::test]
    async fn test_init_survives_remote_failure() {
        let local = MemoryStore::with_items([(FAVOURITE_SPELLS_KEY, r#"[{"id":"s1","name":"Lumos"}]"#)]);
        let remote = InMemoryFavouriteTable::new();
        remote.fail_selects(true);

        let store = ready_store(local, remote).await;

        assert!(store.is_ready());
        assert!(store.favourites().is_empty());
        assert!(store.is_favourite_spell("s1"));
    }

    #[tokio::test]
    async fn test_init_survives_identity_failure() {
        let remote = InMemoryFavouriteTable::new();
        let store = FavouritesStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(remote.clone()),
            Arc::new(BrokenDevice),
        );
        store.init().await;

        assert!(store.is_ready());
        assert_eq!(store.device_id(), "");
        assert_eq!(remote.select_calls(), 0);

        // Without an identity, character toggles are ignored
        assert!(store.toggle_favourite(harry()).is_none());
        assert!(!store.is_favourite("42"));
    }

    #[tokio::test]
    async fn test_init_dedups_loaded_entries() {
        let local = MemoryStore::with_items([(
            FAVOURITE_SPELLS_KEY,
            r#"[{"id":"s1","name":"Lumos"},{"id":"s1","name":"Lumos Maxima"}]"#,
        )]);
        let store = ready_store(local, InMemoryFavouriteTable::new()).await;

        let spells = store.favourite_spells();
        assert_eq!(spells.len(), 1);
        assert_eq!(spells[0].name, "Lumos");
    }

    #[tokio::test]
    async fn test_toggle_before_init_is_noop() {
        let store = FavouritesStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(InMemoryFavouriteTable::new()),
            Arc::new(FixedDevice("dev-1")),
        );

        assert!(store.toggle_favourite(harry()).is_none());
        assert!(!store.is_favourite("42"));
    }

    #[tokio::test]
    async fn test_toggle_on_is_immediate_and_inserts_row() {
        let remote = InMemoryFavouriteTable::new();
        let store = ready_store(MemoryStore::new(), remote.clone()).await;

        let handle = store.toggle_favourite(harry()).unwrap();
        assert!(store.is_favourite("42"));

        assert_eq!(handle.wait().await, ToggleState::Committed);
        assert_eq!(
            remote.rows(),
            vec![FavouriteCharacterRow {
                device_id: "dev-1".to_string(),
                character_id: "42".to_string(),
                name: "Harry Potter".to_string(),
                house: Some("Gryffindor".to_string()),
                image: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_toggle_off_is_immediate_and_deletes_row() {
        let remote = InMemoryFavouriteTable::with_rows(vec![harry().to_row("dev-1")]);
        let store = ready_store(MemoryStore::new(), remote.clone()).await;

        let handle = store.toggle_favourite(harry()).unwrap();
        assert!(!store.is_favourite("42"));

        assert_eq!(handle.wait().await, ToggleState::Committed);
        assert!(remote.rows().is_empty());
    }

    #[tokio::test]
    async fn test_double_toggle_restores_membership() {
        let remote = InMemoryFavouriteTable::new();
        let store = ready_store(MemoryStore::new(), remote.clone()).await;

        let first = store.toggle_favourite(harry()).unwrap();
        let second = store.toggle_favourite(harry()).unwrap();
        assert!(!store.is_favourite("42"));

        first.wait().await;
        second.wait().await;
        assert!(!store.is_favourite("42"));
        assert_eq!(store.favourites().len(), 0);
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back() {
        let remote = InMemoryFavouriteTable::new();
        remote.fail_inserts(true);
        let store = ready_store(MemoryStore::new(), remote.clone()).await;
        let mut events = store.subscribe();

        let handle = store.toggle_favourite(harry()).unwrap();
        assert!(store.is_favourite("42"));

        assert_eq!(handle.wait().await, ToggleState::RolledBack);
        assert!(!store.is_favourite("42"));
        assert_eq!(remote.insert_calls(), 1);

        assert_eq!(events.recv().await.unwrap(), FavouritesEvent::CharactersChanged);
        assert_eq!(events.recv().await.unwrap(), FavouritesEvent::CharactersChanged);
        assert_eq!(
            events.recv().await.unwrap(),
            FavouritesEvent::RolledBack { character_id: "42".to_string() }
        );
    }

    #[tokio::test]
    async fn test_failed_delete_restores() {
        let remote = InMemoryFavouriteTable::with_rows(vec![harry().to_row("dev-1")]);
        remote.fail_deletes(true);
        let store = ready_store(MemoryStore::new(), remote.clone()).await;

        let handle = store.toggle_favourite(harry()).unwrap();
        assert!(!store.is_favourite("42"));

        assert_eq!(handle.wait().await, ToggleState::RolledBack);
        assert!(store.is_favourite("42"));
        assert_eq!(remote.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_does_not_clobber_newer_toggle() {
        let remote = InMemoryFavouriteTable::new();
        remote.fail_inserts(true);
        remote.set_latency(Some(std::time::Duration::from_millis(20)));
        let store = ready_store(MemoryStore::new(), remote.clone()).await;

        // on (insert will fail), then off again before the insert settles
        let on = store.toggle_favourite(harry()).unwrap();
        let off = store.toggle_favourite(harry()).unwrap();
        assert!(!store.is_favourite("42"));

        assert_eq!(on.wait().await, ToggleState::RolledBack);
        // The failed insert must not remove anything: membership already matches
        assert!(!store.is_favourite("42"));

        assert_eq!(off.wait().await, ToggleState::Committed);
        assert!(!store.is_favourite("42"));
    }

    #[tokio::test]
    async fn test_toggle_handle_can_be_dropped() {
        let remote = InMemoryFavouriteTable::new();
        let store = ready_store(MemoryStore::new(), remote.clone()).await;

        drop(store.toggle_favourite(harry()));
        store.dispose().await;

        assert_eq!(remote.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_spell_toggle_persists_locally() {
        let local = MemoryStore::new();
        let store = ready_store(local.clone(), InMemoryFavouriteTable::new()).await;

        let handle = store.toggle_favourite_spell(lumos()).unwrap();
        assert!(store.is_favourite_spell("s1"));
        assert!(handle.wait().await);

        let raw = local.get_item(FAVOURITE_SPELLS_KEY).await.unwrap().unwrap();
        let saved: Vec<Spell> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved, vec![lumos()]);

        assert!(store.toggle_favourite_spell(lumos()).unwrap().wait().await);
        assert!(!store.is_favourite_spell("s1"));
        assert_eq!(local.get_item(FAVOURITE_SPELLS_KEY).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_spell_toggles_never_touch_remote() {
        let mut remote = MockTable::new();
        remote.expect_select_by_device().times(1).returning(|_| Ok(Vec::new()));
        remote.expect_insert().never();
        remote.expect_delete().never();

        let store = FavouritesStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(remote),
            Arc::new(FixedDevice("dev-1")),
        );
        store.init().await;

        store.toggle_favourite_spell(lumos()).unwrap().wait().await;
        store.toggle_favourite_spell(Spell::new("s2", "Nox")).unwrap().wait().await;
        store.toggle_favourite_spell(lumos()).unwrap().wait().await;

        assert_eq!(store.favourite_spells(), vec![Spell::new("s2", "Nox")]);
    }

    #[tokio::test]
    async fn test_spell_write_failure_keeps_memory() {
        let local = MemoryStore::new();
        let store = ready_store(local.clone(), InMemoryFavouriteTable::new()).await;
        local.set_fail_writes(true);

        let handle = store.toggle_favourite_spell(lumos()).unwrap();
        assert!(!handle.wait().await);
        assert!(store.is_favourite_spell("s1"));
    }

    #[tokio::test]
    async fn test_rapid_spell_toggles_save_latest() {
        let local = MemoryStore::new();
        let store = ready_store(local.clone(), InMemoryFavouriteTable::new()).await;

        let handles: Vec<_> = ["s1", "s2", "s3"]
            .iter()
            .filter_map(|id| store.toggle_favourite_spell(Spell::new(*id, "spell")))
            .collect();
        for handle in handles {
            assert!(handle.wait().await);
        }

        let raw = local.get_item(FAVOURITE_SPELLS_KEY).await.unwrap().unwrap();
        let saved: Vec<Spell> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.len(), 3);
    }

    #[tokio::test]
    async fn test_spell_toggle_before_ready_saved_at_init() {
        let local = MemoryStore::new();
        let store = FavouritesStore::new(
            Arc::new(local.clone()),
            Arc::new(InMemoryFavouriteTable::new()),
            Arc::new(FixedDevice("dev-1")),
        );

        assert!(store.toggle_favourite_spell(lumos()).is_none());
        assert!(store.is_favourite_spell("s1"));
        assert_eq!(local.get_item(FAVOURITE_SPELLS_KEY).await.unwrap(), None);

        store.init().await;
        store.dispose().await;

        let raw = local.get_item(FAVOURITE_SPELLS_KEY).await.unwrap().unwrap();
        let saved: Vec<Spell> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved, vec![lumos()]);

        // A fresh store over the same storage sees the spell
        let restarted = ready_store(local, InMemoryFavouriteTable::new()).await;
        assert!(restarted.is_favourite_spell("s1"));
    }

    #[tokio::test]
    async fn test_spell_toggle_before_ready_merges_with_stored() {
        let local = MemoryStore::with_items([(FAVOURITE_SPELLS_KEY, r#"[{"id":"s2","name":"Nox"}]"#)]);
        let store = FavouritesStore::new(
            Arc::new(local.clone()),
            Arc::new(InMemoryFavouriteTable::new()),
            Arc::new(FixedDevice("dev-1")),
        );

        store.toggle_favourite_spell(lumos());
        store.init().await;
        store.dispose().await;

        assert_eq!(store.favourite_spells(), vec![Spell::new("s2", "Nox"), lumos()]);
        let raw = local.get_item(FAVOURITE_SPELLS_KEY).await.unwrap().unwrap();
        let saved: Vec<Spell> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved, store.favourite_spells());
    }

    #[tokio::test]
    async fn test_init_without_changes_does_not_rewrite_spells() {
        let local = MemoryStore::with_items([(FAVOURITE_SPELLS_KEY, "{oops")]);
        let store = ready_store(local.clone(), InMemoryFavouriteTable::new()).await;
        store.dispose().await;

        assert_eq!(local.get_item(FAVOURITE_SPELLS_KEY).await.unwrap().as_deref(), Some("{oops"));
    }

    #[tokio::test]
    async fn test_dispose_waits_and_rejects_toggles() {
        let remote = InMemoryFavouriteTable::new();
        remote.set_latency(Some(std::time::Duration::from_millis(20)));
        let store = ready_store(MemoryStore::new(), remote.clone()).await;

        store.toggle_favourite(harry());
        store.dispose().await;
        assert_eq!(remote.rows().len(), 1);

        assert!(store.toggle_favourite(Character::new("7", "Luna Lovegood", "Ravenclaw")).is_none());
        assert!(store.toggle_favourite_spell(lumos()).is_none());
        assert!(!store.is_favourite("7"));
    }

    #[tokio::test]
    async fn test_rejected_toggle_leaves_no_pending_work() {
        let store = ready_store(MemoryStore::new(), InMemoryFavouriteTable::new()).await;
        store.dispose().await;

        assert!(store.toggle_favourite(harry()).is_none());
        assert!(store.toggle_favourite_spell(lumos()).is_none());

        let again = tokio::time::timeout(std::time::Duration::from_secs(1), store.dispose()).await;
        assert!(again.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dispose_waits_for_concurrent_toggles() {
        let remote = InMemoryFavouriteTable::new();
        remote.set_latency(Some(std::time::Duration::from_millis(5)));
        let store = ready_store(MemoryStore::new(), remote.clone()).await;
        let accepted = Arc::new(AtomicUsize::new(0));

        let togglers: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                let accepted = Arc::clone(&accepted);
                tokio::spawn(async move {
                    let character = Character::new(i.to_string(), format!("Student {i}"), "Hufflepuff");
                    if store.toggle_favourite(character).is_some() {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        store.dispose().await;
        let settled = remote.rows().len();
        for toggler in togglers {
            toggler.await.unwrap();
        }

        // every toggle accepted before dispose returned had already landed
        assert_eq!(settled, accepted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_ready_event() {
        let store = FavouritesStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(InMemoryFavouriteTable::new()),
            Arc::new(FixedDevice("dev-1")),
        );
        let mut events = store.subscribe();

        store.init().await;
        assert_eq!(events.recv().await.unwrap(), FavouritesEvent::Ready);
    }
}
