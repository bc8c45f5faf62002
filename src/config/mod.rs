//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BreakerConfig (validated, immutable)
//!     → Registry::from_config registers breakers, keeps `defaults` as template
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; breakers never change settings after creation
//! - All fields have defaults to allow minimal configs
//! - A zero numeric field means "unset" and takes the default
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, LoadError};
pub use schema::{BreakerConfig, BreakerSettings, ObservabilityConfig};
pub use validation::ConfigError;
