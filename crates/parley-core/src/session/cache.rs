//! In-process session cache with single-flight loading.
//!
//! Maps session ids to live, lockable entries so active sessions avoid a
//! store round-trip and an engine re-initialization on every message.
//!
//! Two layers of synchronization:
//! - the map itself is a `DashMap`, safe for concurrent
//!   insert/lookup/remove across sessions;
//! - each entry is guarded by its own `tokio::sync::RwLock`, which
//!   serializes mutation of one session's state (readers shared, writers
//!   exclusive).
//!
//! Concurrent misses for the same id coalesce into one loader invocation:
//! the first caller installs a shared future in the slot and every
//! concurrent caller awaits the same future, observing the same entry or
//! the same load error. Failed loads evict the slot so a later call can
//! retry. No await ever happens while a map shard guard is held.
//!
//! Entries have no automatic expiry; sessions are evicted by delete or by
//! an external reaper calling [`SessionCache::invalidate`] on idle ids.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::RwLock;
use uuid::Uuid;

use parley_types::error::SessionError;
use parley_types::session::SessionRecord;

use crate::engine::EngineHandle;

/// Live state of one cached session.
pub struct SessionEntry {
    /// Authoritative in-memory record. Always at least as new as the
    /// durable copy; strictly newer while `dirty` is set.
    pub record: SessionRecord,
    /// Engine conversation context; rebuilt whenever the history changes
    /// through any path other than a committed send.
    pub handle: EngineHandle,
    /// Set when a store write failed after a successful generation. The
    /// next successful history commit clears it and supersedes the
    /// missed write.
    pub dirty: bool,
}

impl SessionEntry {
    /// Wrap a freshly loaded or created session.
    pub fn new(record: SessionRecord, handle: EngineHandle) -> Self {
        Self {
            record,
            handle,
            dirty: false,
        }
    }
}

/// A cache entry shared between callers; the lock serializes access to
/// one session's state.
pub type SharedEntry = Arc<RwLock<SessionEntry>>;

type LoadFuture = Shared<BoxFuture<'static, Result<SharedEntry, SessionError>>>;

enum CacheSlot {
    /// A load is in flight; concurrent callers await this future.
    Loading(LoadFuture),
    Ready(SharedEntry),
}

/// Process-wide cache of active sessions.
#[derive(Default)]
pub struct SessionCache {
    slots: DashMap<Uuid, CacheSlot>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Look up a fully loaded entry.
    pub fn get(&self, id: &Uuid) -> Option<SharedEntry> {
        match self.slots.get(id).as_deref() {
            Some(CacheSlot::Ready(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Insert an entry for a session that was just created.
    pub fn insert(&self, id: Uuid, entry: SessionEntry) -> SharedEntry {
        let shared: SharedEntry = Arc::new(RwLock::new(entry));
        self.slots.insert(id, CacheSlot::Ready(shared.clone()));
        shared
    }

    /// Return the cached entry, or run `loader` to produce one.
    ///
    /// Single-flight: when several callers miss on the same id
    /// concurrently, exactly one loader runs and every caller receives
    /// the same entry or the same error.
    pub async fn get_or_load<F, Fut>(&self, id: Uuid, loader: F) -> Result<SharedEntry, SessionError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<SessionEntry, SessionError>> + Send + 'static,
    {
        let load = match self.slots.entry(id) {
            Entry::Occupied(slot) => match slot.get() {
                CacheSlot::Ready(entry) => return Ok(entry.clone()),
                CacheSlot::Loading(load) => load.clone(),
            },
            Entry::Vacant(slot) => {
                let fut = loader();
                let load: LoadFuture = async move {
                    fut.await.map(|entry| Arc::new(RwLock::new(entry)))
                }
                .boxed()
                .shared();
                slot.insert(CacheSlot::Loading(load.clone()));
                load
            }
        };

        let result = load.clone().await;

        // Promote on success, evict on failure -- but only if the slot
        // still belongs to this load (it may have been invalidated or
        // replaced while we were waiting).
        match &result {
            Ok(entry) => {
                if let Some(mut slot) = self.slots.get_mut(&id)
                    && matches!(&*slot, CacheSlot::Loading(current) if current.ptr_eq(&load))
                {
                    *slot = CacheSlot::Ready(entry.clone());
                }
            }
            Err(_) => {
                self.slots.remove_if(&id, |_, slot| {
                    matches!(slot, CacheSlot::Loading(current) if current.ptr_eq(&load))
                });
            }
        }

        result
    }

    /// Remove a session from the cache.
    ///
    /// Used on delete, when the backing record changed underneath the
    /// process (e.g., model rebinding), and by external idle reapers.
    /// Returns whether a slot existed.
    pub fn invalidate(&self, id: &Uuid) -> bool {
        self.slots.remove(id).is_some()
    }

    /// Number of cached sessions (loading slots included).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::future::join_all;
    use serde_json::Map;

    fn entry(id: Uuid) -> SessionEntry {
        let record = SessionRecord::new(id, "gemini-2.5-flash", Vec::new(), Map::new());
        let handle = EngineHandle::new("gemini-2.5-flash", Vec::new());
        SessionEntry::new(record, handle)
    }

    #[tokio::test]
    async fn test_get_or_load_runs_loader_once_for_concurrent_misses() {
        let cache = Arc::new(SessionCache::new());
        let id = Uuid::now_v7();
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks = (0..16).map(|_| {
            let cache = cache.clone();
            let loads = loads.clone();
            async move {
                cache
                    .get_or_load(id, move || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        // Let the other callers pile up on the shared future.
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(entry(id))
                    })
                    .await
            }
        });

        let results = join_all(tasks).await;
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        // All callers got the same entry.
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_failed_load_evicts_slot_and_allows_retry() {
        let cache = SessionCache::new();
        let id = Uuid::now_v7();

        let err = cache
            .get_or_load(id, move || async move {
                Err(SessionError::StoreUnavailable("down".to_string()))
            })
            .await;
        assert!(matches!(err, Err(SessionError::StoreUnavailable(_))));
        assert!(cache.is_empty());

        let ok = cache
            .get_or_load(id, move || async move { Ok(entry(id)) })
            .await;
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failed_load_shares_the_same_error() {
        let cache = Arc::new(SessionCache::new());
        let id = Uuid::now_v7();
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let cache = cache.clone();
            let loads = loads.clone();
            async move {
                cache
                    .get_or_load(id, move || async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Err::<SessionEntry, _>(SessionError::StoreUnavailable("down".to_string()))
                    })
                    .await
            }
        });

        let results = join_all(tasks).await;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        for result in results {
            assert!(matches!(result, Err(SessionError::StoreUnavailable(_))));
        }
    }

    #[tokio::test]
    async fn test_ready_entry_is_returned_without_loading() {
        let cache = SessionCache::new();
        let id = Uuid::now_v7();
        cache.insert(id, entry(id));

        let loaded = cache
            .get_or_load(id, move || async move {
                Err(SessionError::Inconsistency(
                    "loader must not run for a cached session".to_string(),
                ))
            })
            .await
            .unwrap();
        assert_eq!(loaded.read().await.record.id, id);
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let cache = SessionCache::new();
        let id = Uuid::now_v7();
        cache.insert(id, entry(id));

        assert!(cache.invalidate(&id));
        assert!(cache.get(&id).is_none());
        assert!(!cache.invalidate(&id));
    }
}
