//! Engine configuration knobs
//!
//! All knobs can be overridden via `CANONRY_*` environment variables,
//! making it easy to tune a deployment without recompiling the host.

use std::env;

use once_cell::sync::Lazy;

use crate::error::{CanonryError, CanonryResult};

/// Separator and empty strings that dominate identifier traffic in a
/// typical loading phase
static DEFAULT_WARM_STRINGS: Lazy<Vec<String>> =
    Lazy::new(|| ["", " ", ":", "/"].map(String::from).to_vec());

/// Parse an environment variable as a typed value with a default fallback
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Configuration for the optimization engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enable string interning through the default and named pools
    pub enable_string_pool: bool,
    /// Enable vertex array deduplication
    pub enable_array_dedup: bool,
    /// Enable flyweight variant specialization
    pub enable_variant_specialization: bool,
    /// Enable the weak-ownership derived-value cache
    pub enable_weak_cache: bool,
    /// Values heavier than this bypass interning entirely
    pub max_internable_length: usize,
    /// Maximum number of index entries per pool (0 = unlimited)
    pub max_pool_size: usize,
    /// Strings interned into the default pool at phase start
    pub warm_strings: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_string_pool: env_var_or_default("CANONRY_ENABLE_STRING_POOL", true),
            enable_array_dedup: env_var_or_default("CANONRY_ENABLE_ARRAY_DEDUP", true),
            enable_variant_specialization: env_var_or_default(
                "CANONRY_ENABLE_VARIANT_SPECIALIZATION",
                true,
            ),
            enable_weak_cache: env_var_or_default("CANONRY_ENABLE_WEAK_CACHE", true),
            max_internable_length: env_var_or_default("CANONRY_MAX_INTERNABLE_LENGTH", 128),
            max_pool_size: env_var_or_default("CANONRY_MAX_POOL_SIZE", 0),
            warm_strings: DEFAULT_WARM_STRINGS.clone(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration; errors here are fatal at engine setup
    pub fn validate(&self) -> CanonryResult<()> {
        if self.max_internable_length == 0 {
            return Err(CanonryError::InvalidConfiguration {
                message: "max_internable_length must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_internable_length_is_rejected() {
        let config = EngineConfig {
            max_internable_length: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CanonryError::InvalidConfiguration { .. }));
    }
}
