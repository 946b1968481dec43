//! Vertex array deduplication
//!
//! Bulk loading produces huge numbers of numeric arrays, most of them
//! copies of a much smaller distinct set. The deduplicator indexes arrays
//! by a structural FNV-1a hash for fast rejection and falls back to a
//! full element compare on collision. The index holds only weak
//! references: ownership of canonical arrays stays with the callers, and
//! dropping the index at phase end never invalidates handed-out arrays.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use tracing::debug;

use crate::stats::ComponentStats;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the array contents, one round per element
pub fn structural_hash(data: &[i32]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &word in data {
        hash ^= word as u32 as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

type Bucket = SmallVec<[Weak<[i32]>; 1]>;

pub struct VertexArrayDeduplicator {
    index: DashMap<u64, Bucket, FxBuildHasher>,
    hash: fn(&[i32]) -> u64,
    stats: Arc<ComponentStats>,
}

impl VertexArrayDeduplicator {
    pub fn new() -> Self {
        Self::with_stats(Arc::new(ComponentStats::default()))
    }

    pub fn with_stats(stats: Arc<ComponentStats>) -> Self {
        Self {
            index: DashMap::with_hasher(FxBuildHasher::default()),
            hash: structural_hash,
            stats,
        }
    }

    /// Swap in a degenerate hash so collision handling can be exercised
    /// without brute-forcing a real 64-bit collision
    #[cfg(test)]
    fn with_hash_fn(hash: fn(&[i32]) -> u64) -> Self {
        Self {
            index: DashMap::with_hasher(FxBuildHasher::default()),
            hash,
            stats: Arc::new(ComponentStats::default()),
        }
    }

    /// Return the canonical array for `array`'s contents
    ///
    /// Empty arrays pass through unchanged; they are not worth indexing.
    /// On a miss the input itself becomes canonical and is returned, so
    /// the caller's reference is never replaced needlessly.
    pub fn canonicalize(&self, array: Arc<[i32]>) -> Arc<[i32]> {
        self.stats.record_operation();
        if array.is_empty() {
            self.stats.record_bypass();
            return array;
        }
        let hash = (self.hash)(&array);
        let mut bucket = self.index.entry(hash).or_default();
        for weak in bucket.iter() {
            if let Some(existing) = weak.upgrade() {
                // hash matched; only a full compare can confirm equality
                if existing[..] == array[..] {
                    self.stats.record_hit();
                    self.stats.add_bytes_saved(array.len() as u64 * 4);
                    return existing;
                }
            }
        }
        bucket.retain(|weak| weak.strong_count() > 0);
        bucket.push(Arc::downgrade(&array));
        self.stats.record_insert();
        array
    }

    /// `Option` form of the contract: absent arrays pass through
    pub fn canonicalize_opt(&self, array: Option<Arc<[i32]>>) -> Option<Arc<[i32]>> {
        array.map(|a| self.canonicalize(a))
    }

    /// Drop the index, freeing its memory. Already-distributed canonical
    /// arrays remain valid and shared. Callers must stop issuing
    /// `canonicalize` calls before invoking this.
    pub fn invalidate(&self) {
        self.index.clear();
        debug!("vertex array index invalidated");
    }

    /// Number of live arrays currently indexed
    pub fn size(&self) -> usize {
        self.index
            .iter()
            .map(|bucket| {
                bucket
                    .value()
                    .iter()
                    .filter(|weak| weak.strong_count() > 0)
                    .count()
            })
            .sum()
    }

    pub fn operation_count(&self) -> u64 {
        self.stats.operation_count()
    }

    pub fn hit_count(&self) -> u64 {
        self.stats.hit_count()
    }

    pub fn bytes_saved_estimate(&self) -> u64 {
        self.stats.bytes_saved_estimate()
    }

    pub fn stats(&self) -> Arc<ComponentStats> {
        self.stats.clone()
    }
}

impl Default for VertexArrayDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn arr(data: &[i32]) -> Arc<[i32]> {
        Arc::from(data.to_vec())
    }

    #[test]
    fn empty_array_passes_through_unchanged() {
        let dedup = VertexArrayDeduplicator::new();
        let empty = arr(&[]);
        let out = dedup.canonicalize(empty.clone());
        assert!(Arc::ptr_eq(&empty, &out));
        assert_eq!(dedup.size(), 0);
    }

    #[test]
    fn none_passes_through() {
        let dedup = VertexArrayDeduplicator::new();
        assert!(dedup.canonicalize_opt(None).is_none());
    }

    #[test]
    fn equal_content_arrays_share_one_reference() {
        let dedup = VertexArrayDeduplicator::new();
        let a = dedup.canonicalize(arr(&[1, 2, 3]));
        let b = dedup.canonicalize(arr(&[1, 2, 3]));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(dedup.hit_count(), 1);
        assert_eq!(dedup.bytes_saved_estimate(), 12);
    }

    #[test]
    fn one_differing_element_stays_distinct() {
        let dedup = VertexArrayDeduplicator::new();
        let a = dedup.canonicalize(arr(&[1, 2, 3]));
        let b = dedup.canonicalize(arr(&[1, 2, 4]));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(dedup.hit_count(), 0);
    }

    #[test]
    fn index_is_non_owning() {
        let dedup = VertexArrayDeduplicator::new();
        let a = dedup.canonicalize(arr(&[7, 8, 9]));
        assert_eq!(dedup.size(), 1);
        drop(a);
        // the index never kept the array alive; an equal array is a miss
        let _b = dedup.canonicalize(arr(&[7, 8, 9]));
        assert_eq!(dedup.hit_count(), 0);
        assert_eq!(dedup.stats().insert_count(), 2);
    }

    #[test]
    fn invalidate_keeps_handed_out_arrays_valid() {
        let dedup = VertexArrayDeduplicator::new();
        let a = dedup.canonicalize(arr(&[4, 5, 6]));
        dedup.invalidate();
        assert_eq!(&a[..], &[4, 5, 6]);
        assert_eq!(dedup.size(), 0);
    }

    #[test]
    fn colliding_hashes_fall_back_to_full_comparison() {
        // every array lands in one bucket; only the element-wise compare
        // can tell them apart
        let dedup = VertexArrayDeduplicator::with_hash_fn(|_| 0);

        let a = dedup.canonicalize(arr(&[1, 2, 3]));
        let b = dedup.canonicalize(arr(&[4, 5, 6]));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(dedup.hit_count(), 0);
        assert_eq!(dedup.size(), 2);

        // equal content still hits despite sharing the bucket
        let c = dedup.canonicalize(arr(&[1, 2, 3]));
        assert!(Arc::ptr_eq(&a, &c));
        let d = dedup.canonicalize(arr(&[4, 5, 6]));
        assert!(Arc::ptr_eq(&b, &d));
        assert_eq!(dedup.hit_count(), 2);
        assert_eq!(dedup.size(), 2);
    }

    #[test]
    fn hash_is_content_sensitive() {
        assert_ne!(structural_hash(&[1, 2, 3]), structural_hash(&[3, 2, 1]));
        assert_ne!(structural_hash(&[1]), structural_hash(&[1, 0]));
        assert_eq!(structural_hash(&[1, 2, 3]), structural_hash(&[1, 2, 3]));
    }
}
