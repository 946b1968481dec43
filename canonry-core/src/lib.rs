//! Memory-optimization engine for bounded bulk-loading phases
//!
//! During bulk loading a host constructs millions of short-lived,
//! structurally-redundant composite values. This crate keeps that memory
//! bounded with four cooperating components:
//! - [`CanonicalizationPool`]: content-addressed interning for immutable values
//! - [`VertexArrayDeduplicator`]: structural-hash deduplication of numeric arrays
//! - [`VariantSpecializationFactory`]: flyweight representations for values whose
//!   attributes come from small closed domains
//! - [`WeakValueCache`]: memoization of derived values under weak ownership
//!
//! Losing any pooled or cached value is always safe; only the memory
//! saving is forfeited. The [`OptimizationEngine`] ties the components to
//! an explicit warm -> active -> invalidate lifecycle.

pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod pool;
pub mod stats;
pub mod variant;
pub mod weak_cache;

pub use config::EngineConfig;
pub use dedup::VertexArrayDeduplicator;
pub use engine::{OptimizationEngine, Phase, PhaseParticipant};
pub use error::{CanonryError, CanonryResult, Result};
pub use pool::{CanonicalizationPool, Internable};
pub use stats::{ComponentStats, StatisticsRegistry, StatsSnapshot};
pub use variant::{Variant, VariantDescriptor, VariantDomain, VariantSpecializationFactory};
pub use weak_cache::{CacheHandle, CacheKey, WeakValueCache};
