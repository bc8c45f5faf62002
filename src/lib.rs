//! Per-dependency circuit breakers.
//!
//! Wrap calls to an unreliable dependency, track their outcomes over a
//! trailing window, block calls once the failure rate crosses a threshold,
//! and later admit a bounded number of probe calls to decide whether to
//! resume normal traffic.
//!
//! ```rust,ignore
//! let fallback = |cause: FallbackCause<'_, io::Error>| tracing::warn!(?cause, "degraded");
//! match breaker_guard::call("inventory", fetch_stock(sku), Some(&fallback)).await {
//!     Ok(Some(stock)) => render(stock),
//!     Ok(None) => render_cached(),           // breaker open
//!     Err(e) => return Err(e.into()),        // ran and failed
//! }
//! ```

pub mod config;
pub mod observability;
pub mod resilience;

pub use config::{BreakerConfig, BreakerSettings};
pub use resilience::gateway::{call, execute};
pub use resilience::{
    Admission, Breaker, BreakerSnapshot, CallError, Clock, Fallback, FallbackCause, ManualClock,
    RejectReason, RejectedError, Registry, Status, SystemClock,
};
