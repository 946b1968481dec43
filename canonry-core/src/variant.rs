//! Flyweight variant specialization
//!
//! When a value carries a shared payload plus a few attributes drawn from
//! small closed domains, storing those attributes per instance wastes a
//! fixed overhead millions of times over. The factory precomputes one
//! shared descriptor per point of the attribute domain; a specialized
//! value stores a single pointer to its descriptor instead of the
//! attribute fields. Keys outside the declared domain, or domain points
//! with no descriptor, fall back to a generic representation that stores
//! the attributes inline. The fallback never fails and the two
//! representations are indistinguishable through their accessors.

use std::sync::Arc;

use tracing::debug;

use crate::stats::ComponentStats;

/// A closed, pre-enumerated key space for variant specialization
pub trait VariantDomain: Copy + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static {
    /// Number of points in the declared domain
    const CARDINALITY: usize;

    /// Dense index of this key within the declared domain, or `None`
    /// when the key lies outside it
    fn index(&self) -> Option<usize>;

    /// Inverse of `index` over the declared range
    fn from_index(index: usize) -> Option<Self>;
}

/// Shared constants for one domain point
///
/// Exactly one descriptor exists per point; specialized values reference
/// it instead of storing the key's components as fields.
#[derive(Debug)]
pub struct VariantDescriptor<K: VariantDomain> {
    key: K,
    index: usize,
}

impl<K: VariantDomain> VariantDescriptor<K> {
    pub fn key(&self) -> K {
        self.key
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// A composite value produced by the factory
#[derive(Debug, Clone)]
pub enum Variant<K: VariantDomain, P> {
    /// Flyweight representation: attributes live in the shared descriptor
    Specialized {
        payload: P,
        descriptor: Arc<VariantDescriptor<K>>,
    },
    /// Fallback representation storing the attributes inline
    Generic { payload: P, key: K },
}

impl<K: VariantDomain, P> Variant<K, P> {
    pub fn key(&self) -> K {
        match self {
            Variant::Specialized { descriptor, .. } => descriptor.key(),
            Variant::Generic { key, .. } => *key,
        }
    }

    pub fn payload(&self) -> &P {
        match self {
            Variant::Specialized { payload, .. } => payload,
            Variant::Generic { payload, .. } => payload,
        }
    }

    pub fn is_specialized(&self) -> bool {
        matches!(self, Variant::Specialized { .. })
    }
}

/// Dispatch table mapping each domain point to its shared descriptor
pub struct VariantSpecializationFactory<K: VariantDomain> {
    table: Vec<Option<Arc<VariantDescriptor<K>>>>,
    enabled: bool,
    stats: Arc<ComponentStats>,
}

impl<K: VariantDomain> VariantSpecializationFactory<K> {
    pub fn new() -> Self {
        Self::with_stats(true, Arc::new(ComponentStats::default()))
    }

    pub fn with_stats(enabled: bool, stats: Arc<ComponentStats>) -> Self {
        let mut table = Vec::with_capacity(K::CARDINALITY);
        for index in 0..K::CARDINALITY {
            match K::from_index(index) {
                Some(key) => table.push(Some(Arc::new(VariantDescriptor { key, index }))),
                None => {
                    // a hole in the table is not fatal; create() falls back
                    debug!(index, "no key for domain point, generic fallback will be used");
                    table.push(None);
                }
            }
        }
        Self {
            table,
            enabled,
            stats,
        }
    }

    /// Build a value for `key`; specialized when the dispatch table covers
    /// the key, generic otherwise. Never fails for a structurally valid
    /// input.
    pub fn create<P>(&self, payload: P, key: K) -> Variant<K, P> {
        self.stats.record_operation();
        if self.enabled {
            if let Some(index) = key.index() {
                if let Some(Some(descriptor)) = self.table.get(index) {
                    // a miswired index() must not silently bake in wrong
                    // constants; verify before committing to the flyweight
                    if descriptor.key() == key {
                        self.stats.record_hit();
                        self.stats
                            .add_bytes_saved(std::mem::size_of::<K>() as u64);
                        return Variant::Specialized {
                            payload,
                            descriptor: descriptor.clone(),
                        };
                    }
                }
            }
        }
        self.stats.record_fallback();
        debug!(?key, "variant specialization unavailable, using generic representation");
        Variant::Generic { payload, key }
    }

    /// Number of domain points with a usable descriptor
    pub fn specialized_points(&self) -> usize {
        self.table.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn operation_count(&self) -> u64 {
        self.stats.operation_count()
    }

    pub fn fallback_count(&self) -> u64 {
        self.stats.fallback_count()
    }

    pub fn stats(&self) -> Arc<ComponentStats> {
        self.stats.clone()
    }
}

impl<K: VariantDomain> Default for VariantSpecializationFactory<K> {
    fn default() -> Self {
        Self::new()
    }
}
