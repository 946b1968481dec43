//! Content-addressed interning for immutable values
//!
//! A pool maps each logically-equal value to one canonical `Arc` so that
//! bulk-loading code holding millions of near-identical values retains
//! only the distinct ones. The invariant: for any two values held by the
//! same pool that compare equal, `intern` returns the same allocation.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use tracing::debug;

use crate::stats::ComponentStats;

/// Cost measure used by the oversize-bypass policy
pub trait Internable: Eq + Hash + Clone + Send + Sync + 'static {
    /// Relative weight of the value (characters, elements, bytes)
    fn weight(&self) -> usize;
}

impl Internable for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Internable for Vec<i32> {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Thread-safe interning table for one category of values
///
/// Check-and-insert is atomic per value: concurrent `intern` calls with
/// equal inputs all observe a single winner. Values heavier than
/// `max_weight` bypass the index, as do misses once the index holds
/// `max_entries` values (0 = unlimited); both trade a little dedup for a
/// bounded index.
pub struct CanonicalizationPool<T: Internable> {
    name: String,
    index: DashMap<T, Arc<T>, FxBuildHasher>,
    max_weight: usize,
    max_entries: usize,
    stats: Arc<ComponentStats>,
}

impl<T: Internable> CanonicalizationPool<T> {
    pub fn new(name: impl Into<String>, max_weight: usize, max_entries: usize) -> Self {
        Self::with_stats(
            name,
            max_weight,
            max_entries,
            Arc::new(ComponentStats::default()),
        )
    }

    pub fn with_stats(
        name: impl Into<String>,
        max_weight: usize,
        max_entries: usize,
        stats: Arc<ComponentStats>,
    ) -> Self {
        Self {
            name: name.into(),
            index: DashMap::with_hasher(FxBuildHasher::default()),
            max_weight,
            max_entries,
            stats,
        }
    }

    /// Return the canonical reference for any value equal to `value`,
    /// storing `value` as canonical if none exists yet
    pub fn intern(&self, value: T) -> Arc<T> {
        self.stats.record_operation();
        if value.weight() > self.max_weight {
            self.stats.record_bypass();
            return Arc::new(value);
        }
        // Capacity check happens outside the entry critical section; under
        // contention the index may overshoot by a handful of entries, which
        // is acceptable for a bound that exists to stop unbounded growth.
        if self.max_entries != 0 && self.index.len() >= self.max_entries {
            if let Some(existing) = self.index.get(&value) {
                self.stats.record_hit();
                self.stats.add_bytes_saved(value.weight() as u64);
                return existing.value().clone();
            }
            self.stats.record_bypass();
            return Arc::new(value);
        }
        match self.index.entry(value) {
            Entry::Occupied(entry) => {
                self.stats.record_hit();
                self.stats.add_bytes_saved(entry.key().weight() as u64);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let canonical = Arc::new(entry.key().clone());
                entry.insert(canonical.clone());
                self.stats.record_insert();
                canonical
            }
        }
    }

    /// Borrowed-key intern: the hit path allocates nothing
    pub fn intern_ref<Q>(&self, value: &Q) -> Arc<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = T> + ?Sized,
    {
        if let Some(existing) = self.index.get(value) {
            self.stats.record_operation();
            self.stats.record_hit();
            self.stats
                .add_bytes_saved(existing.key().weight() as u64);
            return existing.value().clone();
        }
        self.intern(value.to_owned())
    }

    /// Lookup without insertion
    pub fn get_if_present<Q>(&self, value: &Q) -> Option<Arc<T>>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(value).map(|entry| entry.value().clone())
    }

    /// Insert values without touching the operation counters, so warm-up
    /// does not skew the phase report
    pub fn warm<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            if value.weight() > self.max_weight {
                continue;
            }
            if let Entry::Vacant(entry) = self.index.entry(value) {
                let canonical = Arc::new(entry.key().clone());
                entry.insert(canonical);
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.index.len()
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

    /// Drop the index. Previously returned canonical references stay
    /// valid; subsequent interns behave as if the pool were new.
    pub fn clear(&self) {
        self.index.clear();
        debug!(pool = %self.name, "pool index cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pool() -> CanonicalizationPool<String> {
        CanonicalizationPool::new("test", 128, 0)
    }

    #[test]
    fn equal_values_intern_to_one_reference() {
        let pool = pool();
        let a = pool.intern("stone".to_string());
        let b = pool.intern("stone".to_string());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.hit_count(), 1);
    }

    #[test]
    fn intern_is_idempotent() {
        let pool = pool();
        let a = pool.intern("dirt".to_string());
        let b = pool.intern((*a).clone());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn intern_ref_hits_without_allocating_a_new_canonical() {
        let pool = pool();
        let a = pool.intern_ref("grass");
        let b = pool.intern_ref("grass");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.operation_count(), 2);
        assert_eq!(pool.hit_count(), 1);
    }

    #[test]
    fn oversize_values_bypass_the_index() {
        let pool = CanonicalizationPool::<String>::new("test", 4, 0);
        let a = pool.intern("oversized".to_string());
        let b = pool.intern("oversized".to_string());
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.stats().bypass_count(), 2);
    }

    #[test]
    fn full_pool_serves_hits_but_rejects_new_entries() {
        let pool = CanonicalizationPool::<String>::new("test", 128, 2);
        let a = pool.intern("a".to_string());
        pool.intern("b".to_string());
        let c1 = pool.intern("c".to_string());
        let c2 = pool.intern("c".to_string());
        assert!(!Arc::ptr_eq(&c1, &c2));
        assert_eq!(pool.size(), 2);
        // hits against already-indexed values still work at capacity
        let a2 = pool.intern("a".to_string());
        assert!(Arc::ptr_eq(&a, &a2));
    }

    #[test]
    fn get_if_present_never_inserts() {
        let pool = pool();
        assert!(pool.get_if_present("missing").is_none());
        assert_eq!(pool.size(), 0);
        let a = pool.intern("hit".to_string());
        let b = pool.get_if_present("hit").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn clear_keeps_handed_out_references_valid() {
        let pool = pool();
        let a = pool.intern("kept".to_string());
        pool.clear();
        assert_eq!(pool.size(), 0);
        assert_eq!(&**a, "kept");
        // a fresh intern after clear produces a new canonical
        let b = pool.intern("kept".to_string());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn array_category_pool_interns_small_vectors() {
        let pool = CanonicalizationPool::<Vec<i32>>::new("uv_coords", 16, 0);
        let a = pool.intern(vec![0, 0, 16, 16]);
        let b = pool.intern(vec![0, 0, 16, 16]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.size(), 1);

        // weight is elements, not bytes: a 17-element array bypasses
        let big: Vec<i32> = (0..17).collect();
        let c1 = pool.intern(big.clone());
        let c2 = pool.intern(big);
        assert!(!Arc::ptr_eq(&c1, &c2));
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn warm_does_not_count_operations() {
        let pool = pool();
        pool.warm(["".to_string(), ":".to_string()]);
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.operation_count(), 0);
        assert_eq!(pool.hit_count(), 0);
    }
}
