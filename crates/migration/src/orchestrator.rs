//! Migration Orchestrator (component K, spec §4.K): the state machine and
//! background pipeline that moves a collection from its current schema to
//! a named target version without client-visible downtime. Grounded on the
//! teacher's `watch.rs` (a background task spawned off shared state,
//! tolerant of its own failures, outliving the request that started it)
//! and `init.rs` (a multi-step pipeline that reports progress as it goes).

use std::sync::Arc;

use search_core::{
    AppError, AppResult, MigrationControlRecord, MigrationStatus, SchemaDefinition,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::index_admin::IndexAdmin;
use crate::lock_cache::MigrationLockCache;
use crate::registry::SchemaRegistry;
use crate::store::ControlStore;

const DEFAULT_BATCH_SIZE: u32 = 250;

pub struct StartRequest {
    pub collection: String,
    /// Label recorded as `source_version` on the control record. The
    /// registry has no notion of which version a live collection is
    /// "currently" on (schemas aren't tagged on the wire), so this is
    /// caller-supplied and defaults to `"current"`.
    pub source_version: Option<String>,
    pub target_version: String,
    pub dry_run: bool,
}

pub struct MigrationOrchestrator {
    store: Arc<ControlStore>,
    registry: Arc<SchemaRegistry>,
    index: Arc<dyn IndexAdmin>,
    lock_cache: Arc<MigrationLockCache<Arc<ControlStore>>>,
    batch_size: u32,
}

impl MigrationOrchestrator {
    pub fn new(
        store: Arc<ControlStore>,
        registry: Arc<SchemaRegistry>,
        index: Arc<dyn IndexAdmin>,
        lock_cache: Arc<MigrationLockCache<Arc<ControlStore>>>,
    ) -> Self {
        Self { store, registry, index, lock_cache, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub async fn status(&self, id: &str) -> AppResult<MigrationControlRecord> {
        self.store.get(id).await
    }

    /// `GET /admin/migration/status` with no id (spec §6 "current or last
    /// known status"): whichever migration is active, or else the most
    /// recent one in history.
    pub async fn current(&self) -> AppResult<MigrationControlRecord> {
        if let Some(active) = self.store.find_active().await {
            return Ok(active);
        }
        self.store
            .history()
            .await
            .into_iter()
            .last()
            .ok_or_else(|| AppError::NotFound("no migration has been run yet".into()))
    }

    pub async fn history(&self) -> Vec<MigrationControlRecord> {
        self.store.history().await
    }

    /// Spec §4.K steps 1-3: validate preconditions, persist the `in_progress`
    /// control record, short-circuit on `dry_run`, then hand the rest of the
    /// pipeline to a detached background task (step 4).
    pub async fn start(&self, req: StartRequest) -> AppResult<MigrationControlRecord> {
        if self.store.find_active().await.is_some() {
            return Err(AppError::Conflict("a migration is already in progress".into()));
        }
        // Unlike a plain registry lookup (404 "not found"), an unknown
        // version named at migration start is a malformed request (spec §6
        // "400 when version unknown").
        let target_schema = self.registry.get(&req.target_version).map_err(|_| {
            AppError::Validation(format!(
                "schema version {} is not registered",
                req.target_version
            ))
        })?;
        if !self.index.collection_exists(&req.collection).await? {
            return Err(AppError::NotFound(format!("collection {} not found", req.collection)));
        }

        let id = Uuid::new_v4().to_string();
        let ts = chrono::Utc::now().timestamp();
        let backup_name = format!("backup_{ts}");
        let target_name = format!("{}_v{}_{ts}", req.collection, req.target_version);
        let source_version = req.source_version.clone().unwrap_or_else(|| "current".to_string());

        let record = MigrationControlRecord::new_forward(
            &id,
            &req.collection,
            source_version,
            req.target_version.clone(),
            req.dry_run,
        );
        self.store.insert(record).await;
        self.lock_cache.invalidate();

        let total_documents = self.index.count_documents(&req.collection).await?;
        self.store
            .update(&id, |r| {
                r.total_documents = total_documents;
                r.backup_collection = Some(backup_name.clone());
                r.target_collection = Some(target_name.clone());
            })
            .await?;

        if req.dry_run {
            let record = self.store.update(&id, |r| r.mark_completed()).await?;
            self.lock_cache.invalidate();
            info!(migration_id = %id, collection = %req.collection, "dry-run migration completed without touching the index");
            return Ok(record);
        }

        let store = self.store.clone();
        let index = self.index.clone();
        let lock_cache = self.lock_cache.clone();
        let batch_size = self.batch_size;
        let source = req.collection.clone();
        let background_id = id.clone();

        tokio::spawn(async move {
            // Run the pipeline on its own task so a panic inside it surfaces
            // as a `JoinError` here instead of silently killing this
            // supervisor task and leaving the record stuck `in_progress`
            // (spec §4.K "panic during background execution is caught and
            // transitioned to failed").
            let pipeline_store = store.clone();
            let pipeline_id = background_id.clone();
            let handle = tokio::spawn(async move {
                run_pipeline(
                    &pipeline_store,
                    index.as_ref(),
                    &source,
                    &backup_name,
                    &target_name,
                    &target_schema,
                    batch_size,
                    &pipeline_id,
                )
                .await
            });

            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    warn!(migration_id = %background_id, error = %join_err, "migration pipeline panicked");
                    Err(AppError::Internal(format!("migration pipeline panicked: {join_err}")))
                }
            };
            if let Err(e) = result {
                warn!(migration_id = %background_id, error = %e, "migration pipeline failed");
                let _ = store.update(&background_id, |r| r.mark_failed(e.to_string())).await;
            }
            lock_cache.invalidate();
        });

        self.store.get(&id).await
    }

    /// Spec §4.K "Rollback": alias-flip only, no document copy. Runs inline
    /// since it's a single index call, not a long pipeline.
    pub async fn rollback(
        &self,
        collection: &str,
        migration_id: Option<String>,
    ) -> AppResult<MigrationControlRecord> {
        if self.store.find_active().await.is_some() {
            return Err(AppError::Conflict("a migration is already in progress".into()));
        }
        let original = match migration_id {
            Some(id) => self.store.get(&id).await?,
            None => self.store.latest_completed(collection).await.ok_or_else(|| {
                AppError::NotFound(format!("no completed migration to roll back for {collection}"))
            })?,
        };
        if !original.status.can_roll_back() {
            // Not a conflicting in-progress operation — there's simply no
            // valid backup to roll back to (spec §6 "404 when no suitable
            // backup").
            return Err(AppError::NotFound(format!(
                "migration {} has no backup eligible for rollback",
                original.id
            )));
        }
        let backup = original
            .backup_collection
            .clone()
            .ok_or_else(|| AppError::NotFound("original migration has no backup collection".into()))?;
        if !self.index.collection_exists(&backup).await? {
            return Err(AppError::NotFound(format!("backup collection {backup} no longer exists")));
        }

        let id = Uuid::new_v4().to_string();
        let record = MigrationControlRecord::new_rollback(&id, collection, &original);
        self.store.insert(record).await;
        self.lock_cache.invalidate();

        match self.index.upsert_alias(collection, &backup).await {
            Ok(()) => {
                let record = self.store.update(&id, |r| r.mark_completed()).await?;
                self.lock_cache.invalidate();
                info!(migration_id = %id, collection, backup = %backup, "rollback completed");
                Ok(record)
            }
            Err(e) => {
                self.store.update(&id, |r| r.mark_failed(e.to_string())).await?;
                self.lock_cache.invalidate();
                Err(e)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline(
    store: &ControlStore,
    index: &dyn IndexAdmin,
    source: &str,
    backup_name: &str,
    target_name: &str,
    target_schema: &SchemaDefinition,
    batch_size: u32,
    id: &str,
) -> AppResult<()> {
    let source_schema = index.get_schema(source).await?;

    // 4a. Backup: identical schema, best-effort idempotent copy.
    index.create_collection(backup_name, &source_schema).await?;
    copy_documents(index, source, backup_name, batch_size, None, None).await?;

    // 4b. Create target with the new schema.
    index.create_collection(target_name, target_schema).await?;

    // 4c. Copy-with-transform, reporting progress as it goes.
    copy_documents(index, source, target_name, batch_size, Some(target_schema), Some((store, id)))
        .await?;

    // 4d. Validate: source and target document counts must match.
    let source_count = index.count_documents(source).await?;
    let target_count = index.count_documents(target_name).await?;
    if source_count != target_count {
        return Err(AppError::Conflict(format!(
            "post-copy count mismatch for {source}: source={source_count} target={target_count}"
        )));
    }

    // 4e. Atomic swap: preserve the old shape in a holding collection, then
    // flip the public alias so readers see the new shape with no client change.
    let epoch = chrono::Utc::now().timestamp();
    let holding_name = format!("{source}_old_{epoch}");
    index.create_collection(&holding_name, &source_schema).await?;
    copy_documents(index, source, &holding_name, batch_size, None, None).await?;
    index.upsert_alias(source, target_name).await?;

    store.update(id, |r| r.mark_completed()).await?;
    Ok(())
}

/// Pages through `source` in `batch_size` chunks, applies `schema`'s
/// transform if given, and inserts each batch into `target`. When
/// `progress` is set, updates `migrated_documents` on the named control
/// record after every batch (spec §4.K step 4c "progress polling is
/// meaningful"). Duplicate-id conflicts are tolerated, matching the
/// backup step's idempotent-retry requirement.
async fn copy_documents(
    index: &dyn IndexAdmin,
    source: &str,
    target: &str,
    batch_size: u32,
    schema: Option<&SchemaDefinition>,
    progress: Option<(&ControlStore, &str)>,
) -> AppResult<u64> {
    let mut page = 1u32;
    let mut copied = 0u64;
    loop {
        let batch = index.page_documents(source, page, batch_size).await?;
        if batch.is_empty() {
            break;
        }
        let batch_len = batch.len() as u64;
        let documents = match schema {
            Some(schema) => {
                batch.into_iter().map(|d| schema.apply_transform(d)).collect::<AppResult<Vec<_>>>()?
            }
            None => batch,
        };
        match index.batch_insert(target, documents).await {
            Ok(()) => {}
            Err(AppError::Conflict(msg)) => {
                warn!(target, %msg, "duplicate document ids tolerated during migration copy");
            }
            Err(e) => return Err(e),
        }
        copied += batch_len;
        if let Some((store, id)) = progress {
            store.update(id, |r| r.record_progress(batch_len)).await?;
        }
        if batch_len < batch_size as u64 {
            break;
        }
        page += 1;
    }
    Ok(copied)
}

/// Whether `status` ever reaches a point where a reader could observe the
/// lock flag flip without the cache in front of it (used by tests only to
/// document the state machine this module drives).
#[cfg(test)]
fn locks_request_boundary(status: MigrationStatus) -> bool {
    matches!(status, MigrationStatus::InProgress | MigrationStatus::RollingBack)
}
