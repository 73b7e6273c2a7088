/*!
 * Snapshot stores.
 */

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;

use super::models::{SnapshotKey, TranslationSnapshot};
use crate::database::{DatabaseConnection, Repository};

/// Durable storage for translation snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load a snapshot; `None` is a valid fresh-start state
    async fn load(&self, key: &SnapshotKey) -> Result<Option<TranslationSnapshot>>;

    /// Overwrite the snapshot for a key
    async fn save(&self, key: &SnapshotKey, snapshot: &TranslationSnapshot) -> Result<()>;

    /// Remove the snapshot for a key, returning whether one existed
    async fn clear(&self, key: &SnapshotKey) -> Result<bool>;
}

/// Snapshot store backed by the SQLite `snapshots` table
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    repo: Repository,
}

impl SqliteSnapshotStore {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Open or create the database at a path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Repository::new(DatabaseConnection::new(path)?)))
    }

    /// Store over an in-memory database
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Repository::new_in_memory()?))
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn load(&self, key: &SnapshotKey) -> Result<Option<TranslationSnapshot>> {
        match self
            .repo
            .get_snapshot(&key.document_id, &key.target_language)
            .await?
        {
            Some(row) => {
                let snapshot = TranslationSnapshot::from_record(&row)?;
                debug!(
                    "Loaded snapshot {} ({}/{} rows complete)",
                    key,
                    snapshot.completed_rows(),
                    snapshot.records.len()
                );
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, key: &SnapshotKey, snapshot: &TranslationSnapshot) -> Result<()> {
        let row = snapshot.to_record(key)?;
        self.repo.upsert_snapshot(&row).await
    }

    async fn clear(&self, key: &SnapshotKey) -> Result<bool> {
        let existed = self
            .repo
            .delete_snapshot(&key.document_id, &key.target_language)
            .await?;
        if existed {
            info!("Cleared snapshot {}", key);
        }
        Ok(existed)
    }
}

/// Snapshot store held in process memory
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    snapshots: Arc<Mutex<HashMap<SnapshotKey, TranslationSnapshot>>>,
    saves: Arc<AtomicUsize>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current snapshot for a key, without going through the trait
    pub fn peek(&self, key: &SnapshotKey) -> Option<TranslationSnapshot> {
        self.snapshots.lock().get(key).cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, key: &SnapshotKey) -> Result<Option<TranslationSnapshot>> {
        Ok(self.snapshots.lock().get(key).cloned())
    }

    async fn save(&self, key: &SnapshotKey, snapshot: &TranslationSnapshot) -> Result<()> {
        self.snapshots.lock().insert(key.clone(), snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self, key: &SnapshotKey) -> Result<bool> {
        Ok(self.snapshots.lock().remove(key).is_some())
    }
}
