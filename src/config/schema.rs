//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the breaker
//! registry. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Number of buckets the trailing window is split into.
pub const CELL_COUNT: u64 = 20;

/// Trailing window length used when none is configured.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Cool-down used when none is configured.
pub const DEFAULT_SLEEP_WINDOW_SECS: u64 = 65;

/// Probe calls per recovery cycle used when none is configured.
pub const DEFAULT_PROBE_BUDGET: u32 = 20;

/// Trailing-window failure percentage that opens a breaker.
pub const DEFAULT_ERROR_PERCENT_THRESHOLD: u8 = 50;

/// Probe-cycle failure percentage that keeps a breaker open.
pub const DEFAULT_PROBE_ERROR_PERCENT_THRESHOLD: u8 = 50;

/// Ingestion queue depth used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Root configuration for the breaker registry.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BreakerConfig {
    /// Template for breakers created lazily on first use. The name is ignored.
    pub defaults: BreakerSettings,

    /// Breakers registered up front with explicit settings.
    pub breakers: Vec<BreakerSettings>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Construction parameters for a single breaker.
///
/// A zero in any numeric field means "unset" and is replaced by the matching
/// `DEFAULT_*` constant when the breaker is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Unique breaker identifier.
    pub name: String,

    /// Trailing window length in seconds. Must be a multiple of [`CELL_COUNT`].
    pub interval_secs: u64,

    /// Seconds a breaker stays fully open before a probe is allowed.
    pub sleep_window_secs: u64,

    /// Probe outcomes needed before a reopen/close decision.
    /// Also the number of concurrent probe tickets.
    pub probe_budget: u32,

    /// Failure percentage (1-100) over the trailing window that opens the breaker.
    /// 0 is reserved for "unset" and takes [`DEFAULT_ERROR_PERCENT_THRESHOLD`].
    pub error_percent_threshold: u8,

    /// Failure percentage (1-100) over a probe cycle that keeps the breaker open.
    /// 0 is reserved for "unset" and takes [`DEFAULT_PROBE_ERROR_PERCENT_THRESHOLD`].
    pub probe_error_percent_threshold: u8,

    /// Depth of the outcome ingestion queue (backpressure bound).
    pub queue_capacity: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            sleep_window_secs: DEFAULT_SLEEP_WINDOW_SECS,
            probe_budget: DEFAULT_PROBE_BUDGET,
            error_percent_threshold: DEFAULT_ERROR_PERCENT_THRESHOLD,
            probe_error_percent_threshold: DEFAULT_PROBE_ERROR_PERCENT_THRESHOLD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl BreakerSettings {
    /// Default settings under the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Replace every zero ("unset") field with its default.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.interval_secs == 0 {
            self.interval_secs = defaults.interval_secs;
        }
        if self.sleep_window_secs == 0 {
            self.sleep_window_secs = defaults.sleep_window_secs;
        }
        if self.probe_budget == 0 {
            self.probe_budget = defaults.probe_budget;
        }
        if self.error_percent_threshold == 0 {
            self.error_percent_threshold = defaults.error_percent_threshold;
        }
        if self.probe_error_percent_threshold == 0 {
            self.probe_error_percent_threshold = defaults.probe_error_percent_threshold;
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = defaults.queue_capacity;
        }
        self
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_fills_unset_fields() {
        let settings = BreakerSettings {
            name: "db".into(),
            interval_secs: 0,
            sleep_window_secs: 0,
            probe_budget: 0,
            error_percent_threshold: 0,
            probe_error_percent_threshold: 0,
            queue_capacity: 0,
        }
        .normalized();

        assert_eq!(settings, BreakerSettings::named("db"));
    }

    #[test]
    fn test_normalized_keeps_explicit_values() {
        let settings = BreakerSettings {
            interval_secs: 40,
            probe_budget: 5,
            error_percent_threshold: 30,
            ..BreakerSettings::named("cache")
        }
        .normalized();

        assert_eq!(settings.interval_secs, 40);
        assert_eq!(settings.probe_budget, 5);
        assert_eq!(settings.error_percent_threshold, 30);
        assert_eq!(settings.sleep_window_secs, DEFAULT_SLEEP_WINDOW_SECS);
    }

    #[test]
    fn test_zero_threshold_is_unset() {
        let settings: BreakerSettings = toml::from_str(
            r#"
            name = "search"
            error_percent_threshold = 0
            probe_error_percent_threshold = 1
            "#,
        )
        .unwrap();
        let settings = settings.normalized();

        assert_eq!(settings.error_percent_threshold, DEFAULT_ERROR_PERCENT_THRESHOLD);
        assert_eq!(settings.probe_error_percent_threshold, 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BreakerConfig = toml::from_str(
            r#"
            [[breakers]]
            name = "payments"
            probe_budget = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.breakers.len(), 1);
        assert_eq!(config.breakers[0].probe_budget, 10);
        assert_eq!(config.breakers[0].interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(config.observability.log_level, "info");
    }
}
