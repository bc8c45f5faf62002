//! Breaker simulator.
//!
//! Drives a simulated flaky dependency through the breaker gateway and prints
//! the resulting breaker state as JSON.
//!
//! ```text
//! breaker-sim --calls 2000 --failure-rate 0.6 --concurrency 32
//!     → N concurrent callers → Registry::call("simulated", ...)
//!     → summary { succeeded, failed, rejected, breakers: [...] }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::stream::{self, StreamExt};
use rand::Rng;
use serde_json::json;
use thiserror::Error;

use breaker_guard::config::{load_config, BreakerConfig};
use breaker_guard::observability::{logging, metrics};
use breaker_guard::{CallError, Fallback, FallbackCause, Registry, SystemClock};

#[derive(Parser)]
#[command(name = "breaker-sim")]
#[command(about = "Drive a simulated flaky dependency through a circuit breaker", long_about = None)]
struct Cli {
    /// Breaker configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Breaker to route the simulated calls through.
    #[arg(short, long, default_value = "simulated")]
    breaker: String,

    /// Total calls to make.
    #[arg(long, default_value_t = 1000)]
    calls: usize,

    /// Probability (0.0-1.0) that a call fails.
    #[arg(long, default_value_t = 0.5)]
    failure_rate: f64,

    /// Calls in flight at once.
    #[arg(long, default_value_t = 16)]
    concurrency: usize,

    /// Simulated dependency latency per call.
    #[arg(long, default_value_t = 2)]
    latency_ms: u64,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,
}

#[derive(Debug, Error)]
#[error("simulated dependency failure")]
struct SimulatedFailure;

async fn flaky_dependency(failure_rate: f64, latency: Duration) -> Result<u64, SimulatedFailure> {
    let fail = rand::thread_rng().gen_bool(failure_rate.clamp(0.0, 1.0));
    tokio::time::sleep(latency).await;
    if fail {
        Err(SimulatedFailure)
    } else {
        Ok(latency.as_millis() as u64)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BreakerConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        breaker = %cli.breaker,
        calls = cli.calls,
        failure_rate = cli.failure_rate,
        concurrency = cli.concurrency,
        "breaker-sim starting"
    );

    let metrics_address = match cli.metrics_address {
        Some(addr) => Some(addr),
        None if config.observability.metrics_enabled => {
            match config.observability.metrics_address.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    );
                    None
                }
            }
        }
        None => None,
    };
    if let Some(addr) = metrics_address {
        metrics::init_metrics(addr)?;
    }

    let registry = Registry::from_config(&config, Arc::new(SystemClock))?;

    let succeeded = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let rejected = AtomicUsize::new(0);
    let fallback: &Fallback<'_, SimulatedFailure> = &|cause| {
        if let FallbackCause::Rejected(err) = cause {
            tracing::trace!(reason = ?err.reason, "Call rejected");
            rejected.fetch_add(1, Ordering::Relaxed);
        }
    };
    let latency = Duration::from_millis(cli.latency_ms);

    let (registry, cli) = (&registry, &cli);
    let (succeeded, failed) = (&succeeded, &failed);
    stream::iter(0..cli.calls)
        .for_each_concurrent(cli.concurrency.max(1), move |_| async move {
            let run = flaky_dependency(cli.failure_rate, latency);
            match registry.call(&cli.breaker, run, Some(fallback)).await {
                Ok(Some(_)) => {
                    succeeded.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {}
                Err(CallError::Operation(_)) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Call not attempted");
                }
            }
        })
        .await;

    if let Some(breaker) = registry.get(&cli.breaker) {
        breaker.counter().settle().await;
    }

    let summary = json!({
        "succeeded": succeeded.load(Ordering::Relaxed),
        "failed": failed.load(Ordering::Relaxed),
        "rejected": rejected.load(Ordering::Relaxed),
        "breakers": registry.snapshots(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    tracing::info!("Simulation complete");
    Ok(())
}
