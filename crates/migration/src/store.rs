//! Control-record persistence backing the orchestrator. Grounded on the
//! teacher's `ServerState`: a single `Arc<RwLock<...>>`-guarded collection
//! mutated by both the request handler and a spawned background task
//! (`watch.rs`'s `process_changes` pattern). `tokio::sync::RwLock` rather
//! than `std::sync::RwLock` since the background pipeline holds the guard
//! across `.await` points while paging through documents.

use async_trait::async_trait;
use search_core::{AppError, AppResult, MigrationControlRecord, MigrationStatus};
use tokio::sync::RwLock;

use crate::lock_cache::LockSource;

/// In-memory history of migration control records, newest last.
pub struct ControlStore {
    records: RwLock<Vec<MigrationControlRecord>>,
}

impl ControlStore {
    pub fn new() -> Self {
        Self { records: RwLock::new(Vec::new()) }
    }

    pub async fn insert(&self, record: MigrationControlRecord) {
        self.records.write().await.push(record);
    }

    pub async fn get(&self, id: &str) -> AppResult<MigrationControlRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("migration {id} not found")))
    }

    pub async fn history(&self) -> Vec<MigrationControlRecord> {
        self.records.read().await.clone()
    }

    /// Whichever record (if any) currently has an in-progress forward
    /// migration or rollback (spec §4.K "Preconditions for Start").
    pub async fn find_active(&self) -> Option<MigrationControlRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| !r.status.allows_new_migration())
            .cloned()
    }

    /// The most recently completed forward migration for `collection`, used
    /// as the rollback target when the caller doesn't name one explicitly.
    pub async fn latest_completed(&self, collection: &str) -> Option<MigrationControlRecord> {
        self.records
            .read()
            .await
            .iter()
            .rev()
            .find(|r| {
                r.collection == collection
                    && r.status == MigrationStatus::Completed
                    && r.backup_collection.is_some()
            })
            .cloned()
    }

    /// Apply `f` to the record named `id` and persist the result.
    pub async fn update<F>(&self, id: &str, f: F) -> AppResult<MigrationControlRecord>
    where
        F: FnOnce(&mut MigrationControlRecord),
    {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("migration {id} not found")))?;
        f(record);
        Ok(record.clone())
    }
}

impl Default for ControlStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockSource for ControlStore {
    async fn has_active_migration(&self) -> bool {
        self.records.read().await.iter().any(|r| !r.status.allows_new_migration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_active_sees_in_progress_records() {
        let store = ControlStore::new();
        assert!(store.find_active().await.is_none());
        store
            .insert(MigrationControlRecord::new_forward("m1", "services", "v1", "v2", false))
            .await;
        let active = store.find_active().await.unwrap();
        assert_eq!(active.id, "m1");
    }

    #[tokio::test]
    async fn update_persists_mutation() {
        let store = ControlStore::new();
        store
            .insert(MigrationControlRecord::new_forward("m1", "services", "v1", "v2", false))
            .await;
        store.update("m1", |r| r.record_progress(250)).await.unwrap();
        let record = store.get("m1").await.unwrap();
        assert_eq!(record.migrated_documents, 250);
    }

    #[tokio::test]
    async fn latest_completed_requires_backup_and_completed_status() {
        let store = ControlStore::new();
        let mut record = MigrationControlRecord::new_forward("m1", "services", "v1", "v2", false);
        record.backup_collection = Some("backup_1".into());
        record.mark_completed();
        store.insert(record).await;
        let latest = store.latest_completed("services").await.unwrap();
        assert_eq!(latest.id, "m1");
        assert!(store.latest_completed("other").await.is_none());
    }

    #[tokio::test]
    async fn has_active_migration_reflects_status() {
        let store = ControlStore::new();
        assert!(!store.has_active_migration().await);
        store
            .insert(MigrationControlRecord::new_forward("m1", "services", "v1", "v2", false))
            .await;
        assert!(store.has_active_migration().await);
    }
}
