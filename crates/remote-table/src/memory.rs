//! In-process stand-in for the remote table
//!
//! Behaves like the real table (including the unique `(device_id,
//! character_id)` constraint) and lets callers inject failures and latency.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::postgrest::PostgrestError;
use crate::table::{FavouriteCharacterRow, FavouriteCharacterTable};
use crate::Result;

#[derive(Default)]
struct Faults {
    fail_select: AtomicBool,
    fail_insert: AtomicBool,
    fail_delete: AtomicBool,
}

#[derive(Default)]
struct Calls {
    select: AtomicUsize,
    insert: AtomicUsize,
    delete: AtomicUsize,
}

/// In-memory [`FavouriteCharacterTable`]
#[derive(Default, Clone)]
pub struct InMemoryFavouriteTable {
    rows: Arc<Mutex<Vec<FavouriteCharacterRow>>>,
    faults: Arc<Faults>,
    calls: Arc<Calls>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl InMemoryFavouriteTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding `rows`
    pub fn with_rows(rows: Vec<FavouriteCharacterRow>) -> Self {
        Self { rows: Arc::new(Mutex::new(rows)), ..Default::default() }
    }

    /// Snapshot of every stored row
    pub fn rows(&self) -> Vec<FavouriteCharacterRow> {
        self.rows.lock().clone()
    }

    /// Make selects fail
    pub fn fail_selects(&self, fail: bool) {
        self.faults.fail_select.store(fail, Ordering::SeqCst);
    }

    /// Make inserts fail
    pub fn fail_inserts(&self, fail: bool) {
        self.faults.fail_insert.store(fail, Ordering::SeqCst);
    }

    /// Make deletes fail
    pub fn fail_deletes(&self, fail: bool) {
        self.faults.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Delay every operation by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Number of selects issued
    pub fn select_calls(&self) -> usize {
        self.calls.select.load(Ordering::SeqCst)
    }

    /// Number of inserts issued
    pub fn insert_calls(&self) -> usize {
        self.calls.insert.load(Ordering::SeqCst)
    }

    /// Number of deletes issued
    pub fn delete_calls(&self) -> usize {
        self.calls.delete.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn injected(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(PostgrestError::new(503, "Unavailable", "injected failure").into());
        }
        Ok(())
    }
}

#[async_trait]
impl FavouriteCharacterTable for InMemoryFavouriteTable {
    async fn select_by_device(&self, device_id: &str) -> Result<Vec<FavouriteCharacterRow>> {
        self.calls.select.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        Self::injected(&self.faults.fail_select)?;

        Ok(self.rows.lock().iter().filter(|r| r.device_id == device_id).cloned().collect())
    }

    async fn insert(&self, row: &FavouriteCharacterRow) -> Result<()> {
        self.calls.insert.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        Self::injected(&self.faults.fail_insert)?;

        let mut rows = self.rows.lock();
        let duplicate = rows
            .iter()
            .any(|r| r.device_id == row.device_id && r.character_id == row.character_id);
        if duplicate {
            return Err(PostgrestError::new(409, "23505", "duplicate key value violates unique constraint").into());
        }
        rows.push(row.clone());
        Ok(())
    }

    async fn delete(&self, device_id: &str, character_id: &str) -> Result<()> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        Self::injected(&self.faults.fail_delete)?;

        self.rows
            .lock()
            .retain(|r| !(r.device_id == device_id && r.character_id == character_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(device: &str, id: &str) -> FavouriteCharacterRow {
        FavouriteCharacterRow {
            device_id: device.to_string(),
            character_id: id.to_string(),
            name: format!("Character {}", id),
            house: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_select_filters_by_device() {
        let table = InMemoryFavouriteTable::with_rows(vec![row("a", "1"), row("b", "2"), row("a", "3")]);

        let rows = table.select_by_device("a").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.device_id == "a"));
        assert_eq!(table.select_calls(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let table = InMemoryFavouriteTable::new();

        table.insert(&row("a", "1")).await.unwrap();
        let err = table.insert(&row("a", "1")).await.unwrap_err();
        assert!(err.to_string().contains("23505"));

        // Same character on another device is a different row
        table.insert(&row("b", "1")).await.unwrap();
        assert_eq!(table.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_is_scoped_to_device() {
        let table = InMemoryFavouriteTable::with_rows(vec![row("a", "1"), row("b", "1")]);

        table.delete("a", "1").await.unwrap();
        assert_eq!(table.rows(), vec![row("b", "1")]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let table = InMemoryFavouriteTable::new();
        table.fail_inserts(true);

        assert!(table.insert(&row("a", "1")).await.is_err());
        assert!(table.rows().is_empty());
        assert_eq!(table.insert_calls(), 1);

        table.fail_inserts(false);
        table.insert(&row("a", "1")).await.unwrap();
        assert_eq!(table.rows().len(), 1);
    }
}
