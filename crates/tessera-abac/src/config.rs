//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AbacError, Result};

/// Tunables for [`AbacEngine`](crate::engine::AbacEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbacConfig {
    /// Serve repeated identical requests from the decision cache.
    pub cache_enabled: bool,
    /// How long a cached decision stays valid.
    pub cache_ttl_secs: u64,
    /// Maximum number of cached decisions (least recently used evicted).
    pub cache_capacity: usize,
    /// Minimum time between sweeps of expired cache entries.
    pub cache_sweep_interval_secs: u64,
    /// Longest regex pattern accepted at registration, in bytes.
    pub max_regex_len: usize,
    /// Compiled program size limit for a regex, in bytes.
    pub regex_size_limit: usize,
}

impl Default for AbacConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_secs: 300,
            cache_capacity: 10_000,
            cache_sweep_interval_secs: 60,
            max_regex_len: 1024,
            regex_size_limit: 1 << 20,
        }
    }
}

impl AbacConfig {
    /// Configuration with the decision cache turned off.
    pub fn uncached() -> Self {
        Self {
            cache_enabled: false,
            ..Self::default()
        }
    }

    /// Sets the cache TTL (builder pattern).
    ///
    /// The TTL is stored in whole seconds; a fractional TTL is rounded up,
    /// so only `Duration::ZERO` becomes zero.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }

    /// Rejects zero TTL, sweep interval, capacity and regex limits.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(AbacError::validation("cache_ttl_secs must be positive"));
        }
        if self.cache_sweep_interval_secs == 0 {
            return Err(AbacError::validation(
                "cache_sweep_interval_secs must be positive",
            ));
        }
        if self.cache_capacity == 0 {
            return Err(AbacError::validation("cache_capacity must be positive"));
        }
        if self.max_regex_len == 0 || self.regex_size_limit == 0 {
            return Err(AbacError::validation("regex limits must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AbacConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let config = AbacConfig::default().with_cache_ttl(Duration::ZERO);
        assert!(matches!(config.validate(), Err(AbacError::Validation(_))));
    }

    #[test]
    fn test_subsecond_ttl_rounds_up() {
        let config = AbacConfig::default().with_cache_ttl(Duration::from_millis(500));
        assert_eq!(config.cache_ttl_secs, 1);
        assert!(config.validate().is_ok());

        let config = AbacConfig::default().with_cache_ttl(Duration::from_millis(2_001));
        assert_eq!(config.cache_ttl(), Duration::from_secs(3));

        let config = AbacConfig::default().with_cache_ttl(Duration::from_secs(30));
        assert_eq!(config.cache_ttl_secs, 30);
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        let config = AbacConfig {
            cache_sweep_interval_secs: 0,
            ..AbacConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AbacConfig = toml::from_str("cache_ttl_secs = 30\n").expect("parse");
        assert_eq!(config.cache_ttl_secs, 30);
        assert_eq!(config.cache_capacity, 10_000);
        assert!(config.cache_enabled);
    }
}
