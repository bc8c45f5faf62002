//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every breaker is named and names are unique
//! - Check that the trailing window divides evenly into buckets
//! - Check percentage thresholds stay within 0-100
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BreakerConfig → Result<(), Vec<ConfigError>>
//! - Settings are validated after unset fields take their defaults

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{BreakerConfig, BreakerSettings, CELL_COUNT};

/// Breaker construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Breakers must be named.
    #[error("breaker name is required")]
    NameRequired,

    /// The trailing window must split evenly into buckets.
    #[error("breaker `{name}`: interval {interval_secs}s is not a multiple of {cells}")]
    IntervalNotDivisible {
        name: String,
        interval_secs: u64,
        cells: u64,
    },

    /// A percentage threshold above 100.
    #[error("breaker `{name}`: {field} = {value} is outside 0-100")]
    ThresholdOutOfRange {
        name: String,
        field: &'static str,
        value: u8,
    },

    /// A second breaker under an already registered name.
    #[error("breaker `{0}` is already registered")]
    DuplicateName(String),

    /// The breaker's ingestion worker thread could not be started.
    #[error("breaker `{name}`: failed to start ingestion worker: {reason}")]
    WorkerSpawn { name: String, reason: String },
}

/// Validate one breaker's settings, stopping at the first problem.
pub fn validate_settings(settings: &BreakerSettings) -> Result<(), ConfigError> {
    match settings_errors(settings).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Validate a whole configuration, collecting every problem.
pub fn validate_config(config: &BreakerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // The template is never registered under its own name.
    let template = BreakerSettings {
        name: "defaults".to_string(),
        ..config.defaults.clone()
    };
    errors.extend(settings_errors(&template));

    let mut seen = HashSet::new();
    for settings in &config.breakers {
        errors.extend(settings_errors(settings));
        if !settings.name.is_empty() && !seen.insert(settings.name.as_str()) {
            errors.push(ConfigError::DuplicateName(settings.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn settings_errors(settings: &BreakerSettings) -> Vec<ConfigError> {
    let settings = settings.clone().normalized();
    let mut errors = Vec::new();

    if settings.name.is_empty() {
        errors.push(ConfigError::NameRequired);
    }
    if settings.interval_secs % CELL_COUNT != 0 {
        errors.push(ConfigError::IntervalNotDivisible {
            name: settings.name.clone(),
            interval_secs: settings.interval_secs,
            cells: CELL_COUNT,
        });
    }
    for (field, value) in [
        ("error_percent_threshold", settings.error_percent_threshold),
        ("probe_error_percent_threshold", settings.probe_error_percent_threshold),
    ] {
        if value > 100 {
            errors.push(ConfigError::ThresholdOutOfRange {
                name: settings.name.clone(),
                field,
                value,
            });
        }
    }
    errors
}
