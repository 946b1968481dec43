//! Engine lifecycle and component wiring
//!
//! The engine is an explicit object with a documented lifecycle
//! (idle -> active -> invalidated) passed by reference to callers. It
//! owns the default string pool, a registry of named pools and the vertex
//! deduplicator; variant factories and weak caches it creates share its
//! statistics registry and, for caches, take part in phase transitions.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use tracing::info;

use crate::config::EngineConfig;
use crate::dedup::VertexArrayDeduplicator;
use crate::error::{CanonryError, CanonryResult};
use crate::pool::{CanonicalizationPool, Internable};
use crate::stats::StatisticsRegistry;
use crate::variant::{VariantDomain, VariantSpecializationFactory};
use crate::weak_cache::{CacheKey, WeakValueCache};

const WEAK_CACHE_PURGE_INTERVAL: u64 = 64;
const WEAK_CACHE_PURGE_CAP: usize = 32;

/// Engine lifecycle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Active = 1,
    Invalidated = 2,
}

/// A component that takes part in phase transitions
pub trait PhaseParticipant: Send + Sync {
    /// Pre-populate caches ahead of the bulk-loading phase
    fn warm(&self) {}

    /// Drop indexes at the end of the phase. Handed-out canonical
    /// references stay valid.
    fn invalidate(&self);
}

impl<T: Internable> PhaseParticipant for CanonicalizationPool<T> {
    fn invalidate(&self) {
        self.clear();
    }
}

impl PhaseParticipant for VertexArrayDeduplicator {
    fn invalidate(&self) {
        VertexArrayDeduplicator::invalidate(self);
    }
}

impl<K: CacheKey, V: Send + Sync> PhaseParticipant for WeakValueCache<K, V> {
    fn invalidate(&self) {
        self.clear();
    }
}

pub struct OptimizationEngine {
    config: EngineConfig,
    stats: StatisticsRegistry,
    string_pool: Arc<CanonicalizationPool<String>>,
    pools: DashMap<String, Arc<CanonicalizationPool<String>>, FxBuildHasher>,
    vertex_dedup: Arc<VertexArrayDeduplicator>,
    participants: RwLock<Vec<Arc<dyn PhaseParticipant>>>,
    phase: AtomicU8,
}

impl OptimizationEngine {
    pub fn new(config: EngineConfig) -> CanonryResult<Self> {
        config.validate()?;
        let stats = StatisticsRegistry::new();
        let string_pool = Arc::new(CanonicalizationPool::with_stats(
            "string_pool",
            config.max_internable_length,
            config.max_pool_size,
            stats.register("string_pool"),
        ));
        let vertex_dedup = Arc::new(VertexArrayDeduplicator::with_stats(
            stats.register("vertex_dedup"),
        ));
        Ok(Self {
            config,
            stats,
            string_pool,
            pools: DashMap::with_hasher(FxBuildHasher::default()),
            vertex_dedup,
            participants: RwLock::new(Vec::new()),
            phase: AtomicU8::new(Phase::Idle as u8),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &StatisticsRegistry {
        &self.stats
    }

    pub fn phase(&self) -> Phase {
        match self.phase.load(Ordering::Acquire) {
            0 => Phase::Idle,
            1 => Phase::Active,
            _ => Phase::Invalidated,
        }
    }

    /// Intern through the default string pool; pass-through when string
    /// pooling is disabled (the optimization is lost, nothing else)
    pub fn intern(&self, value: &str) -> Arc<String> {
        if !self.config.enable_string_pool {
            return Arc::new(value.to_string());
        }
        self.string_pool.intern_ref(value)
    }

    pub fn canonicalize_vertices(&self, array: Arc<[i32]>) -> Arc<[i32]> {
        if !self.config.enable_array_dedup {
            return array;
        }
        self.vertex_dedup.canonicalize(array)
    }

    pub fn string_pool(&self) -> &Arc<CanonicalizationPool<String>> {
        &self.string_pool
    }

    pub fn vertex_dedup(&self) -> &Arc<VertexArrayDeduplicator> {
        &self.vertex_dedup
    }

    /// Create an additional named string pool scoped to one value category
    pub fn register_pool(&self, name: &str) -> CanonryResult<Arc<CanonicalizationPool<String>>> {
        if name.is_empty() {
            return Err(CanonryError::PreconditionViolation {
                field: "name".to_string(),
                message: "pool name must not be empty".to_string(),
            });
        }
        match self.pools.entry(name.to_string()) {
            Entry::Occupied(_) => Err(CanonryError::AlreadyExists {
                resource: format!("pool '{name}'"),
            }),
            Entry::Vacant(entry) => {
                let pool = Arc::new(CanonicalizationPool::with_stats(
                    name,
                    self.config.max_internable_length,
                    self.config.max_pool_size,
                    self.stats.register(name),
                ));
                entry.insert(pool.clone());
                Ok(pool)
            }
        }
    }

    pub fn pool(&self, name: &str) -> CanonryResult<Arc<CanonicalizationPool<String>>> {
        self.pools
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CanonryError::NotFound {
                resource: format!("pool '{name}'"),
            })
    }

    /// Create a variant factory wired into the engine's statistics
    pub fn variant_factory<K: VariantDomain>(
        &self,
        name: &str,
    ) -> Arc<VariantSpecializationFactory<K>> {
        Arc::new(VariantSpecializationFactory::with_stats(
            self.config.enable_variant_specialization,
            self.stats.register(name),
        ))
    }

    /// Create a weak cache wired into the engine's statistics and phase
    /// lifecycle
    pub fn weak_cache<K: CacheKey, V: Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Arc<WeakValueCache<K, V>> {
        let cache = Arc::new(WeakValueCache::with_settings(
            self.config.enable_weak_cache,
            WEAK_CACHE_PURGE_INTERVAL,
            WEAK_CACHE_PURGE_CAP,
            self.stats.register(name),
        ));
        self.attach(cache.clone());
        cache
    }

    /// Attach an external component to the phase lifecycle
    pub fn attach(&self, participant: Arc<dyn PhaseParticipant>) {
        self.participants.write().push(participant);
    }

    /// Begin the bulk-loading phase, pre-populating pools with the
    /// configured common constants
    pub fn on_phase_start(&self) {
        self.phase.store(Phase::Active as u8, Ordering::Release);
        if self.config.enable_string_pool {
            self.string_pool
                .warm(self.config.warm_strings.iter().cloned());
        }
        for participant in self.participants.read().iter() {
            participant.warm();
        }
        info!(
            warmed = self.config.warm_strings.len(),
            "bulk-loading phase started"
        );
    }

    /// End the bulk-loading phase: invalidate every component and return
    /// the final statistics report
    ///
    /// This is a barrier, not a concurrent operation; callers must stop
    /// issuing intern/canonicalize/create calls before invoking it.
    pub fn on_phase_end(&self) -> String {
        self.phase.store(Phase::Invalidated as u8, Ordering::Release);
        VertexArrayDeduplicator::invalidate(&self.vertex_dedup);
        self.string_pool.clear();
        for pool in self.pools.iter() {
            pool.value().clear();
        }
        for participant in self.participants.read().iter() {
            participant.invalidate();
        }
        let report = self.stats.summary();
        info!("bulk-loading phase ended\n{report}");
        report
    }
}
