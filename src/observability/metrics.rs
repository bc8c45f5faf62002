//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_calls_total` (counter): calls by breaker and outcome
//! - `breaker_open` (gauge): 1=open, 0=closed
//! - `breaker_transitions_total` (counter): status flips by breaker and target status
//! - `breaker_probe_cycles_total` (counter): completed probe cycles by decision

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::status::Status;

/// How a single call through a breaker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
    Rejected,
    ProbeSuccess,
    ProbeFailure,
}

impl CallOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Rejected => "rejected",
            CallOutcome::ProbeSuccess => "probe_success",
            CallOutcome::ProbeFailure => "probe_failure",
        }
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_call(breaker: &str, outcome: CallOutcome) {
    metrics::counter!(
        "breaker_calls_total",
        "breaker" => breaker.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_status(breaker: &str, status: Status) {
    let value = match status {
        Status::Open => 1.0,
        Status::Closed => 0.0,
    };
    metrics::gauge!("breaker_open", "breaker" => breaker.to_string()).set(value);
}

pub fn record_transition(breaker: &str, to: Status) {
    metrics::counter!(
        "breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_status(breaker, to);
}

pub fn record_probe_cycle(breaker: &str, decision: Status) {
    metrics::counter!(
        "breaker_probe_cycles_total",
        "breaker" => breaker.to_string(),
        "decision" => decision.as_str()
    )
    .increment(1);
}
