//! Migration Lock Cache (component L, spec §4.L): a short-TTL read-side
//! cache over "is there an active migration?" so the request boundary's
//! CUD-lockout check never blocks on the control-record store in the hot
//! path. Grounded on `search-engine`'s `ttl_cache.rs`/`spec_cache.rs`
//! shape, but single-valued: there's one lock flag, not a keyed map, so a
//! plain `RwLock<Option<(bool, Instant)>>` fits better than `DashMap`.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Whatever can answer "is a migration currently in progress or rolling
/// back?" — the orchestrator's control-record store implements this.
#[async_trait]
pub trait LockSource: Send + Sync {
    async fn has_active_migration(&self) -> bool;
}

/// Caches the answer to [`LockSource::has_active_migration`] for `ttl`.
///
/// A stale `true` over-blocks CUD requests by at most `ttl`; a stale
/// `false` under-blocks by the same margin. Both are acceptable per spec
/// §4.L since the migration itself is idempotent and runs in the
/// background — neither staleness can corrupt anything.
pub struct MigrationLockCache<S: LockSource> {
    source: S,
    ttl: Duration,
    state: RwLock<Option<(bool, Instant)>>,
}

impl<S: LockSource> MigrationLockCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, DEFAULT_TTL)
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self { source, ttl, state: RwLock::new(None) }
    }

    fn cached(&self) -> Option<bool> {
        let state = self.state.read().expect("lock cache lock poisoned");
        state.and_then(|(locked, checked_at)| (checked_at.elapsed() < self.ttl).then_some(locked))
    }

    /// Double-checked read: a cache hit never touches `source`. On a miss,
    /// every racing caller may independently requery — tolerated rather
    /// than serialized, since a redundant query is harmless and holding a
    /// lock across an `.await` would block the fast-path readers this
    /// cache exists to protect.
    pub async fn is_locked(&self) -> bool {
        if let Some(locked) = self.cached() {
            return locked;
        }
        let locked = self.source.has_active_migration().await;
        *self.state.write().expect("lock cache lock poisoned") = Some((locked, Instant::now()));
        locked
    }

    /// Force the next read to requery, used right after a migration starts
    /// or completes so CUD lockout reacts without waiting out the TTL.
    pub fn invalidate(&self) {
        *self.state.write().expect("lock cache lock poisoned") = None;
    }
}

#[async_trait]
impl<T: LockSource + ?Sized> LockSource for std::sync::Arc<T> {
    async fn has_active_migration(&self) -> bool {
        (**self).has_active_migration().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        locked: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LockSource for CountingSource {
        async fn has_active_migration(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.locked
        }
    }

    #[tokio::test]
    async fn caches_within_ttl() {
        let cache = MigrationLockCache::with_ttl(
            CountingSource { locked: true, calls: AtomicUsize::new(0) },
            Duration::from_secs(60),
        );
        assert!(cache.is_locked().await);
        assert!(cache.is_locked().await);
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn requeries_after_ttl_expiry() {
        let cache = MigrationLockCache::with_ttl(
            CountingSource { locked: false, calls: AtomicUsize::new(0) },
            Duration::from_millis(1),
        );
        assert!(!cache.is_locked().await);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!cache.is_locked().await);
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_requery() {
        let cache = MigrationLockCache::with_ttl(
            CountingSource { locked: true, calls: AtomicUsize::new(0) },
            Duration::from_secs(60),
        );
        assert!(cache.is_locked().await);
        cache.invalidate();
        assert!(cache.is_locked().await);
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }
}
