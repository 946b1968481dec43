//! Weak-ownership cache for expensive derived values
//!
//! The cache memoizes supplier results without keeping them alive: the
//! table stores weak references only, so once every external handle is
//! dropped the value is reclaimed and a later lookup legitimately builds
//! a new one. Reclamation is reported through a queue fed by the slot's
//! `Drop`, and the table entry for each drained key is removed promptly
//! in amortized passes rather than by scanning the whole table.

use std::hash::Hash;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxBuildHasher;
use tracing::trace;

use crate::stats::ComponentStats;

const DEFAULT_PURGE_INTERVAL: u64 = 64;
const DEFAULT_PURGE_CAP: usize = 32;

/// Bounds required of cache keys
pub trait CacheKey: Eq + Hash + Clone + Send + Sync + 'static {}
impl<T: Eq + Hash + Clone + Send + Sync + 'static> CacheKey for T {}

struct CacheSlot<K: CacheKey, V> {
    key: K,
    value: V,
    reclaimed: Weak<Mutex<Vec<K>>>,
}

impl<K: CacheKey, V> Drop for CacheSlot<K, V> {
    fn drop(&mut self) {
        // last external handle gone; tell the cache the entry is dead
        if let Some(queue) = self.reclaimed.upgrade() {
            queue.lock().push(self.key.clone());
        }
    }
}

/// Handle to a cached value
///
/// The cache holds only a weak reference to the slot behind this handle;
/// the value stays alive exactly as long as some handle does.
pub struct CacheHandle<K: CacheKey, V> {
    slot: Arc<CacheSlot<K, V>>,
}

impl<K: CacheKey, V> CacheHandle<K, V> {
    pub fn key(&self) -> &K {
        &self.slot.key
    }

    /// Reference identity of two handles
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.slot, &b.slot)
    }
}

impl<K: CacheKey, V> Deref for CacheHandle<K, V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.slot.value
    }
}

impl<K: CacheKey, V> Clone for CacheHandle<K, V> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<K: CacheKey, V: std::fmt::Debug> std::fmt::Debug for CacheHandle<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CacheHandle").field(&self.slot.value).finish()
    }
}

pub struct WeakValueCache<K: CacheKey, V> {
    index: DashMap<K, Weak<CacheSlot<K, V>>, FxBuildHasher>,
    reclaimed: Arc<Mutex<Vec<K>>>,
    purge_interval: u64,
    purge_cap: usize,
    op_counter: AtomicU64,
    enabled: bool,
    stats: Arc<ComponentStats>,
}

impl<K: CacheKey, V> WeakValueCache<K, V> {
    pub fn new() -> Self {
        Self::with_settings(
            true,
            DEFAULT_PURGE_INTERVAL,
            DEFAULT_PURGE_CAP,
            Arc::new(ComponentStats::default()),
        )
    }

    pub fn with_settings(
        enabled: bool,
        purge_interval: u64,
        purge_cap: usize,
        stats: Arc<ComponentStats>,
    ) -> Self {
        Self {
            index: DashMap::with_hasher(FxBuildHasher::default()),
            reclaimed: Arc::new(Mutex::new(Vec::new())),
            purge_interval: purge_interval.max(1),
            purge_cap,
            op_counter: AtomicU64::new(0),
            enabled,
            stats,
        }
    }

    /// Return the live value for `key` if one exists, otherwise invoke
    /// `supplier` and cache the result under weak ownership
    ///
    /// Atomic per key: concurrent callers observe one winner and the
    /// supplier runs at most once while a live value exists. The supplier
    /// runs inside the key's critical section, which is fine for the
    /// CPU-bound construction this cache exists for. The supplier must
    /// not call back into this cache (the shard lock is not re-entrant
    /// and a same-shard re-entry deadlocks silently) and must not block
    /// on I/O or other threads.
    pub fn get_or_create<F>(&self, key: K, supplier: F) -> CacheHandle<K, V>
    where
        F: FnOnce() -> V,
    {
        self.stats.record_operation();
        if !self.enabled {
            return CacheHandle {
                slot: Arc::new(CacheSlot {
                    key,
                    value: supplier(),
                    reclaimed: Weak::new(),
                }),
            };
        }
        self.maybe_purge();
        match self.index.entry(key) {
            Entry::Occupied(mut entry) => {
                if let Some(slot) = entry.get().upgrade() {
                    self.stats.record_hit();
                    return CacheHandle { slot };
                }
                // referent reclaimed but not yet purged; replace in place
                let slot = self.new_slot(entry.key().clone(), supplier());
                entry.insert(Arc::downgrade(&slot));
                self.stats.record_insert();
                CacheHandle { slot }
            }
            Entry::Vacant(entry) => {
                let slot = self.new_slot(entry.key().clone(), supplier());
                entry.insert(Arc::downgrade(&slot));
                self.stats.record_insert();
                CacheHandle { slot }
            }
        }
    }

    fn new_slot(&self, key: K, value: V) -> Arc<CacheSlot<K, V>> {
        Arc::new(CacheSlot {
            key,
            value,
            reclaimed: Arc::downgrade(&self.reclaimed),
        })
    }

    /// Lookup without insertion; `None` when absent or reclaimed
    pub fn get(&self, key: &K) -> Option<CacheHandle<K, V>> {
        self.index
            .get(key)
            .and_then(|weak| weak.upgrade())
            .map(|slot| CacheHandle { slot })
    }

    fn maybe_purge(&self) {
        let ops = self.op_counter.fetch_add(1, Ordering::Relaxed) + 1;
        if ops % self.purge_interval != 0 {
            return;
        }
        self.purge(self.purge_cap);
    }

    /// Remove up to `cap` entries whose referents have been reclaimed
    pub fn purge(&self, cap: usize) -> usize {
        let keys: Vec<K> = {
            let mut queue = self.reclaimed.lock();
            let take = cap.min(queue.len());
            queue.drain(..take).collect()
        };
        let mut removed = 0;
        for key in keys {
            // a live slot may have been re-inserted under the same key
            // since the notification was queued; only remove dead entries
            if self
                .index
                .remove_if(&key, |_, weak| weak.strong_count() == 0)
                .is_some()
            {
                removed += 1;
            }
        }
        if removed > 0 {
            trace!(removed, "purged reclaimed cache entries");
        }
        removed
    }

    /// Number of table entries, dead ones included until purged
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Explicit full purge for external invalidation signals
    pub fn clear(&self) {
        self.index.clear();
        self.reclaimed.lock().clear();
    }

    pub fn operation_count(&self) -> u64 {
        self.stats.operation_count()
    }

    pub fn hit_count(&self) -> u64 {
        self.stats.hit_count()
    }

    pub fn stats(&self) -> Arc<ComponentStats> {
        self.stats.clone()
    }
}

impl<K: CacheKey, V> Default for WeakValueCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
