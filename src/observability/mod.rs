//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers produce:
//!     → tracing events (transitions, rejections, probe decisions)
//!     → metrics.rs (counters and gauges per breaker)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Metrics endpoint (Prometheus scrape, installed by the host binary)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`breaker = %name`) on every event
//! - Metrics go through the `metrics` facade; without a recorder they are no-ops
//! - Logging and metrics are installed by the host, never by the library itself

pub mod logging;
pub mod metrics;
