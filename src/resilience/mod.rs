//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → gateway.rs (validate name/operation, resolve breaker)
//!     → registry.rs (one breaker per name, created on first use)
//!     → circuit_breaker.rs (admit / reject / probe, then account the outcome)
//!         → window.rs (trailing failure rate, probe-cycle decision, status flag)
//!         → tickets.rs (bound concurrent probes)
//! ```
//!
//! # Design Decisions
//! - Breaker state is local to the process; nothing is persisted or shared
//! - Rejection is a control decision: reported to the fallback, not returned as an error
//! - Atomics for flags and counters, one worker thread per breaker for bucket updates

pub mod circuit_breaker;
pub mod clock;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod status;
pub mod tickets;
pub mod window;

pub use circuit_breaker::{Admission, Breaker, BreakerSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CallError, Fallback, FallbackCause, RejectReason, RejectedError};
pub use registry::Registry;
pub use status::Status;
