//! Migration control record and state machine (spec §3 "Migration control
//! record", §4.K).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle states for a migration (spec §4.K).
///
/// Forward path: `Idle -> InProgress -> Completed | Failed`. A rollback is a
/// *new* control record — not a continuation of the original — whose own
/// lifecycle is `InProgress(RollingBack) -> Completed`. There is no
/// `Failed -> Completed` edge: a failed migration never flipped the alias,
/// so nothing needs to be rolled back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Idle,
    InProgress,
    #[serde(rename = "rollback")]
    RollingBack,
    Completed,
    Failed,
}

impl MigrationStatus {
    /// Whether a new migration may start while this status holds (spec §4.K
    /// "Preconditions for Start": no record currently `in_progress`).
    pub fn allows_new_migration(&self) -> bool {
        !matches!(self, MigrationStatus::InProgress | MigrationStatus::RollingBack)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationStatus::Completed | MigrationStatus::Failed)
    }

    /// Only a completed forward migration can be rolled back (spec §4.K
    /// "Rollback... Preconditions: backup collection still exists").
    pub fn can_roll_back(&self) -> bool {
        matches!(self, MigrationStatus::Completed)
    }
}

/// A single migration's control record (spec §3, §4.K step 2).
///
/// `is_locked` is read by the [Migration Lock Cache](crate) to reject CUD
/// verbs at the request boundary while a migration or rollback is active.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrationControlRecord {
    pub id: String,
    /// Public collection name (the alias readers query through).
    pub collection: String,
    pub source_version: String,
    pub target_version: String,
    pub status: MigrationStatus,
    pub is_locked: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_documents: u64,
    pub migrated_documents: u64,
    /// Name of the backup collection created before the swap (step 1/4a).
    pub backup_collection: Option<String>,
    /// Name of the newly created target collection (step 1/4b), pre-swap.
    pub target_collection: Option<String>,
    pub dry_run: bool,
    pub error: Option<String>,
}

impl MigrationControlRecord {
    pub fn new_forward(
        id: impl Into<String>,
        collection: impl Into<String>,
        source_version: impl Into<String>,
        target_version: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            source_version: source_version.into(),
            target_version: target_version.into(),
            status: MigrationStatus::InProgress,
            is_locked: true,
            started_at: Utc::now(),
            completed_at: None,
            total_documents: 0,
            migrated_documents: 0,
            backup_collection: None,
            target_collection: None,
            dry_run,
            error: None,
        }
    }

    /// A new record for a rollback operation (spec §4.K "Rollback"): source
    /// and target are swapped relative to the migration being undone.
    pub fn new_rollback(
        id: impl Into<String>,
        collection: impl Into<String>,
        rolled_back_from: &MigrationControlRecord,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            source_version: rolled_back_from.target_version.clone(),
            target_version: rolled_back_from.source_version.clone(),
            status: MigrationStatus::RollingBack,
            is_locked: true,
            started_at: Utc::now(),
            completed_at: None,
            total_documents: rolled_back_from.total_documents,
            migrated_documents: 0,
            backup_collection: rolled_back_from.backup_collection.clone(),
            target_collection: None,
            dry_run: false,
            error: None,
        }
    }

    pub fn mark_completed(&mut self) {
        self.status = MigrationStatus::Completed;
        self.is_locked = false;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = MigrationStatus::Failed;
        self.is_locked = false;
        self.error = Some(reason.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn record_progress(&mut self, batch: u64) {
        self.migrated_documents += batch;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_progress_and_rolling_back_block_new_migrations() {
        assert!(!MigrationStatus::InProgress.allows_new_migration());
        assert!(!MigrationStatus::RollingBack.allows_new_migration());
        assert!(MigrationStatus::Idle.allows_new_migration());
        assert!(MigrationStatus::Completed.allows_new_migration());
    }

    #[test]
    fn only_completed_can_roll_back() {
        assert!(MigrationStatus::Completed.can_roll_back());
        assert!(!MigrationStatus::Failed.can_roll_back());
        assert!(!MigrationStatus::InProgress.can_roll_back());
    }

    #[test]
    fn forward_record_unlocks_on_completion() {
        let mut record = MigrationControlRecord::new_forward("m1", "services", "v1", "v2", false);
        assert!(record.is_locked);
        assert_eq!(record.status, MigrationStatus::InProgress);
        record.record_progress(250);
        assert_eq!(record.migrated_documents, 250);
        record.mark_completed();
        assert_eq!(record.status, MigrationStatus::Completed);
        assert!(!record.is_locked);
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn rollback_record_swaps_versions() {
        let mut original = MigrationControlRecord::new_forward("m1", "services", "v1", "v2", false);
        original.backup_collection = Some("backup_123".into());
        original.mark_completed();
        let rollback = MigrationControlRecord::new_rollback("m2", "services", &original);
        assert_eq!(rollback.source_version, "v2");
        assert_eq!(rollback.target_version, "v1");
        assert_eq!(rollback.status, MigrationStatus::RollingBack);
        assert!(rollback.is_locked);
        assert_eq!(rollback.backup_collection, Some("backup_123".into()));
    }

    #[test]
    fn rolling_back_serializes_to_rollback() {
        assert_eq!(serde_json::to_string(&MigrationStatus::RollingBack).unwrap(), "\"rollback\"");
    }

    #[test]
    fn failed_migration_unlocks_without_completing() {
        let mut record = MigrationControlRecord::new_forward("m1", "services", "v1", "v2", false);
        record.mark_failed("index unreachable");
        assert_eq!(record.status, MigrationStatus::Failed);
        assert!(!record.is_locked);
        assert!(!record.status.can_roll_back());
    }
}
