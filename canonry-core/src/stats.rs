//! Cross-cutting counters for the engine components
//!
//! Every component records its operations into a shared registry so an
//! external reporting collaborator can read hits, misses and estimated
//! bytes saved without touching the components themselves.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Atomic counters for a single component
#[derive(Debug, Default)]
pub struct ComponentStats {
    operations: AtomicU64,
    hits: AtomicU64,
    inserts: AtomicU64,
    bypasses: AtomicU64,
    fallbacks: AtomicU64,
    bytes_saved: AtomicU64,
}

impl ComponentStats {
    pub fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// A value skipped the index entirely (oversize or capacity policy)
    pub fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    /// A caller took the unoptimized path (generic representation)
    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_saved(&self, bytes: u64) {
        self.bytes_saved.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn insert_count(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    pub fn bypass_count(&self) -> u64 {
        self.bypasses.load(Ordering::Relaxed)
    }

    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn bytes_saved_estimate(&self) -> u64 {
        self.bytes_saved.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            operations: self.operation_count(),
            hits: self.hit_count(),
            inserts: self.insert_count(),
            bypasses: self.bypass_count(),
            fallbacks: self.fallback_count(),
            bytes_saved: self.bytes_saved_estimate(),
        }
    }
}

/// Point-in-time copy of a component's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub operations: u64,
    pub hits: u64,
    pub inserts: u64,
    pub bypasses: u64,
    pub fallbacks: u64,
    pub bytes_saved: u64,
}

/// Registry of named component counters
#[derive(Debug, Clone, Default)]
pub struct StatisticsRegistry {
    components: Arc<RwLock<FxHashMap<String, Arc<ComponentStats>>>>,
}

impl StatisticsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the counters for a named component
    pub fn register(&self, name: &str) -> Arc<ComponentStats> {
        let mut components = self.components.write();
        components
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ComponentStats::default()))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ComponentStats>> {
        self.components.read().get(name).cloned()
    }

    /// Snapshot all components, sorted by name
    pub fn snapshot(&self) -> Vec<(String, StatsSnapshot)> {
        let components = self.components.read();
        let mut rows: Vec<_> = components
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Render a human-readable summary table
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10} {:>14}",
            "component", "ops", "hits", "inserts", "bypasses", "fallbacks", "bytes saved"
        );
        for (name, snap) in self.snapshot() {
            let _ = writeln!(
                out,
                "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10} {:>14}",
                name,
                snap.operations,
                snap.hits,
                snap.inserts,
                snap.bypasses,
                snap.fallbacks,
                snap.bytes_saved
            );
        }
        out
    }
}
