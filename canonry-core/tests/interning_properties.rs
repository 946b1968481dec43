//! Property-based checks for the identity invariants.

use std::sync::Arc;

use canonry_core::{CanonicalizationPool, VertexArrayDeduplicator};
use proptest::prelude::*;

proptest! {
    #[test]
    fn interning_is_idempotent_for_any_string(value in ".{0,64}") {
        let pool = CanonicalizationPool::<String>::new("prop", 256, 0);
        let first = pool.intern(value.clone());
        let second = pool.intern(value);
        let third = pool.intern((*first).clone());
        prop_assert!(Arc::ptr_eq(&first, &second));
        prop_assert!(Arc::ptr_eq(&first, &third));
        prop_assert_eq!(pool.size(), 1);
    }

    #[test]
    fn pool_size_tracks_distinct_values(values in proptest::collection::vec(".{0,16}", 1..32)) {
        let pool = CanonicalizationPool::<String>::new("prop", 256, 0);
        let mut canonical = Vec::new();
        for value in &values {
            canonical.push(pool.intern(value.clone()));
        }
        let distinct: std::collections::HashSet<&String> = values.iter().collect();
        prop_assert_eq!(pool.size(), distinct.len());
        // re-interning everything changes nothing
        for (value, expected) in values.iter().zip(&canonical) {
            prop_assert!(Arc::ptr_eq(&pool.intern(value.clone()), expected));
        }
        prop_assert_eq!(pool.size(), distinct.len());
    }

    #[test]
    fn equal_arrays_always_collapse(data in proptest::collection::vec(any::<i32>(), 1..64)) {
        let dedup = VertexArrayDeduplicator::new();
        let first = dedup.canonicalize(Arc::from(data.clone()));
        let second = dedup.canonicalize(Arc::from(data));
        prop_assert!(Arc::ptr_eq(&first, &second));
        prop_assert_eq!(dedup.hit_count(), 1);
    }

    #[test]
    fn different_arrays_stay_distinct(
        data in proptest::collection::vec(any::<i32>(), 1..64),
        flip in 0usize..64,
    ) {
        let index = flip % data.len();
        let mut other = data.clone();
        other[index] = other[index].wrapping_add(1);

        let dedup = VertexArrayDeduplicator::new();
        let first = dedup.canonicalize(Arc::from(data));
        let second = dedup.canonicalize(Arc::from(other));
        prop_assert!(!Arc::ptr_eq(&first, &second));
        prop_assert_eq!(dedup.hit_count(), 0);
    }
}
