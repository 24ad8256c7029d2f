//! Token manager configuration.
//!
//! Durations are written in humantime notation (`"15m"`, `"7d"`, `"0s"`).
//!
//! # Example (TOML)
//!
//! ```toml
//! access_token_ttl = "15m"
//! refresh_token_ttl = "7d"
//! cleanup_interval = "1m"
//!
//! [cache]
//! enabled = true
//! ttl = "5m"
//! max_entries = 10000
//!
//! [revocation]
//! shards = 16
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for a [`TokenManager`](crate::TokenManager).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenManagerConfig {
    /// Default lifetime of access tokens.
    #[serde(with = "humantime_serde")]
    pub access_token_ttl: Duration,

    /// Default lifetime of refresh tokens.
    #[serde(with = "humantime_serde")]
    pub refresh_token_ttl: Duration,

    /// Validation cache settings.
    pub cache: CacheConfig,

    /// Revocation store settings.
    pub revocation: RevocationConfig,

    /// Period of the background maintenance sweep.
    /// Zero disables the loop; expired entries are then only dropped lazily.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,

    /// Shortest token accepted by the structural pre-check.
    pub min_token_length: usize,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            cache: CacheConfig::default(),
            revocation: RevocationConfig::default(),
            cleanup_interval: Duration::from_secs(60),
            min_token_length: 16,
        }
    }
}

/// Validation cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Memoize validation outcomes.
    pub enabled: bool,

    /// How long a cached outcome stays usable.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Maximum number of cached outcomes.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(5 * 60),
            max_entries: 10_000,
        }
    }
}

/// Revocation store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RevocationConfig {
    /// Number of independently locked shards. Fixed for the store's lifetime.
    pub shards: usize,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self { shards: 16 }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl TokenManagerConfig {
    /// Parses a configuration from a TOML document.
    ///
    /// Missing keys take their default values. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed TOML and any error from
    /// [`validate`](Self::validate).
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - A token TTL is zero
    /// - The revocation store has no shards
    /// - The cache is enabled with a zero TTL or capacity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "access_token_ttl must be > 0".to_string(),
            ));
        }

        if self.refresh_token_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "refresh_token_ttl must be > 0".to_string(),
            ));
        }

        if self.revocation.shards == 0 {
            return Err(ConfigError::InvalidValue(
                "revocation shards must be > 0".to_string(),
            ));
        }

        if self.cache.enabled {
            if self.cache.max_entries == 0 {
                return Err(ConfigError::InvalidValue(
                    "cache max_entries must be > 0".to_string(),
                ));
            }
            if self.cache.ttl.is_zero() {
                return Err(ConfigError::InvalidValue(
                    "cache ttl must be > 0".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Configuration suited to tests: no background loop.
    #[must_use]
    pub fn for_testing() -> Self {
        Self::default().without_maintenance()
    }

    /// Sets the default access token lifetime.
    #[must_use]
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    /// Sets the default refresh token lifetime.
    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    /// Enables or disables the validation cache.
    #[must_use]
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    /// Sets the validation cache TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }

    /// Sets the validation cache capacity.
    #[must_use]
    pub fn with_cache_max_entries(mut self, max_entries: usize) -> Self {
        self.cache.max_entries = max_entries;
        self
    }

    /// Sets the revocation shard count.
    #[must_use]
    pub fn with_revocation_shards(mut self, shards: usize) -> Self {
        self.revocation.shards = shards;
        self
    }

    /// Sets the maintenance interval.
    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Disables the background maintenance loop.
    #[must_use]
    pub fn without_maintenance(self) -> Self {
        self.with_cleanup_interval(Duration::ZERO)
    }

    /// Sets the minimum token length accepted by the pre-check.
    #[must_use]
    pub fn with_min_token_length(mut self, len: usize) -> Self {
        self.min_token_length = len;
        self
    }

    /// Returns `true` if a maintenance loop should run.
    #[must_use]
    pub fn maintenance_enabled(&self) -> bool {
        !self.cleanup_interval.is_zero()
    }
}
