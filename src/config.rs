//! Configuration Module
//!
//! Handles loading and managing engine configuration from environment variables.

use std::env;

/// Engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the in-process tier can hold
    pub max_hot_entries: usize,
    /// Default TTL in milliseconds for entries without an explicit TTL
    pub default_ttl_ms: u64,
    /// Multiplier on the TTL during which stale entries are still served
    /// while a background refresh runs
    pub stale_grace: f64,
    /// Interval in milliseconds between prefetch ranking sweeps
    pub prefetch_interval_ms: u64,
    /// Maximum number of keys emitted per prefetch sweep
    pub prefetch_limit: usize,
    /// Interval in milliseconds between batch strategy analysis sweeps
    pub strategy_sweep_interval_ms: u64,
    /// Retention window in milliseconds after which untouched strategies
    /// are garbage-collected
    pub strategy_retention_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_HOT_ENTRIES` - In-process tier capacity (default: 1000)
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `STALE_GRACE` - Stale-grace multiplier (default: 2.0)
    /// - `PREFETCH_INTERVAL_MS` - Prefetch sweep interval (default: 60000)
    /// - `PREFETCH_LIMIT` - Keys per prefetch sweep (default: 16)
    /// - `STRATEGY_SWEEP_INTERVAL_MS` - Strategy sweep interval (default: 300000)
    /// - `STRATEGY_RETENTION_MS` - Strategy GC window (default: 86400000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_hot_entries: env::var("MAX_HOT_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_hot_entries),
            default_ttl_ms: env::var("DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl_ms),
            stale_grace: env::var("STALE_GRACE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.stale_grace),
            prefetch_interval_ms: env::var("PREFETCH_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prefetch_interval_ms),
            prefetch_limit: env::var("PREFETCH_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prefetch_limit),
            strategy_sweep_interval_ms: env::var("STRATEGY_SWEEP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.strategy_sweep_interval_ms),
            strategy_retention_ms: env::var("STRATEGY_RETENTION_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.strategy_retention_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_hot_entries: 1000,
            default_ttl_ms: 300_000,
            stale_grace: 2.0,
            prefetch_interval_ms: 60_000,
            prefetch_limit: 16,
            strategy_sweep_interval_ms: 300_000,
            strategy_retention_ms: 86_400_000,
        }
    }
}
