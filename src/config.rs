//! Cache configuration.
//!
//! Controls the read-through decorator and the in-memory tagged store.

use std::num::NonZeroUsize;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_ENTRY_LIMIT: usize = 1024;
const DEFAULT_COMPRESSION_THRESHOLD_BYTES: usize = 512;
const DEFAULT_FLUSH_BATCH_LIMIT: usize = 100;

/// Policy applied when the cache store itself cannot be reached.
///
/// Failing closed is the default; serving every request as a bypass is a
/// deployment decision and must be opted into explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorPolicy {
    /// Surface the store error to the caller.
    Fail,
    /// Forward the request to the wrapped route as if a no-cache state
    /// were present.
    Bypass,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the read-through cache. When disabled every load forwards
    /// to the wrapped route.
    pub enabled: bool,
    /// Context state flags that force a cache bypass (e.g. an active
    /// admin-preview session whose responses must never be shared).
    pub no_cache_states: Vec<String>,
    /// What to do when the store cannot be reached.
    pub store_error_policy: StoreErrorPolicy,
    /// Compress stored payloads above the threshold.
    pub compression: bool,
    /// Minimum serialized size (bytes) before compression applies.
    pub compression_threshold_bytes: usize,
    /// Maximum entries held by the in-memory store.
    pub entry_limit: usize,
    /// Maximum deferred invalidations applied per flush batch.
    pub flush_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            no_cache_states: Vec::new(),
            store_error_policy: StoreErrorPolicy::Fail,
            compression: true,
            compression_threshold_bytes: DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            entry_limit: DEFAULT_ENTRY_LIMIT,
            flush_batch_limit: DEFAULT_FLUSH_BATCH_LIMIT,
        }
    }
}

impl CacheConfig {
    /// Returns true if the given state flag forces a bypass.
    pub fn is_no_cache_state(&self, state: &str) -> bool {
        self.no_cache_states.iter().any(|s| s == state)
    }

    /// Returns the entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn entry_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.entry_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert!(config.no_cache_states.is_empty());
        assert_eq!(config.store_error_policy, StoreErrorPolicy::Fail);
        assert!(config.compression);
        assert_eq!(config.compression_threshold_bytes, 512);
        assert_eq!(config.entry_limit, 1024);
        assert_eq!(config.flush_batch_limit, 100);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            entry_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.entry_limit_non_zero().get(), 1);
    }

    #[test]
    fn no_cache_state_lookup() {
        let config = CacheConfig {
            no_cache_states: vec!["admin-preview".to_string()],
            ..Default::default()
        };
        assert!(config.is_no_cache_state("admin-preview"));
        assert!(!config.is_no_cache_state("logged-in"));
    }

    #[test]
    fn store_error_policy_deserializes_from_snake_case() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"store_error_policy": "bypass"}"#).expect("valid config");
        assert_eq!(config.store_error_policy, StoreErrorPolicy::Bypass);
    }
}
