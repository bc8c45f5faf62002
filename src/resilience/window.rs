//! Sliding window failure-rate counter.
//!
//! # Responsibilities
//! - Track call outcomes over a trailing window in fixed time buckets
//! - Open the breaker when the trailing failure percentage crosses its threshold
//! - Count probe outcomes exactly once per recovery cycle and decide reopen/close
//!
//! # Data Flow
//! ```text
//! record_outcome (caller, async)
//!     → bounded mpsc queue (backpressure when full)
//!     → ingestion worker thread (sole owner of the buckets)
//!     → Window::record → Window::failure_percent → StatusFlag
//!
//! record_probe_outcome (caller, sync)
//!     → ProbeTally (single atomic word) → StatusFlag on cycle completion
//! ```
//!
//! # Design Decisions
//! - Buckets are never shared; only the worker touches them, so no per-cell locking
//! - A bucket is stamped when it is (re)opened; a bucket older than one window
//!   restarts at 1 instead of accumulating across window wraps
//! - Outcomes are stamped at enqueue time so queue lag cannot move them between buckets
//! - Status may flip OPEN slightly after the failing call returns

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};

use crate::config::schema::{BreakerSettings, CELL_COUNT};
use crate::config::validation::ConfigError;
use crate::observability::metrics;
use crate::resilience::clock::Clock;
use crate::resilience::status::{Status, StatusFlag};

/// Requests needed in the trailing window before its failure rate is trusted.
pub const MIN_SAMPLES: u64 = 10;

const CELLS: usize = CELL_COUNT as usize;

/// `round(100 * part / total)`, halves rounding up.
fn percent(part: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((200 * part + total) / (2 * total)).min(100) as u8
}

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    value: u64,
    stamp: Option<u64>,
}

impl Cell {
    fn bump(&mut self, at: u64, window_secs: u64) {
        match self.stamp {
            Some(stamp) if at.saturating_sub(stamp) < window_secs => self.value += 1,
            _ => {
                self.value = 1;
                self.stamp = Some(at);
            }
        }
    }

    fn live_value(&self, now: u64, window_secs: u64) -> u64 {
        match self.stamp {
            Some(stamp) if stamp + window_secs > now => self.value,
            _ => 0,
        }
    }
}

/// Request and failure buckets over the trailing window.
#[derive(Debug)]
pub struct Window {
    window_secs: u64,
    cell_secs: u64,
    start: u64,
    requests: [Cell; CELLS],
    failures: [Cell; CELLS],
}

impl Window {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs,
            cell_secs: (window_secs / CELL_COUNT).max(1),
            start: 0,
            requests: [Cell::default(); CELLS],
            failures: [Cell::default(); CELLS],
        }
    }

    fn index(&mut self, at: u64) -> usize {
        let mut elapsed = at.saturating_sub(self.start);
        if elapsed >= self.window_secs {
            self.start = at;
            elapsed = 0;
        }
        ((elapsed / self.cell_secs) as usize).min(CELLS - 1)
    }

    /// Attribute one outcome observed at `at` to its bucket.
    pub fn record(&mut self, at: u64, success: bool) {
        let idx = self.index(at);
        self.requests[idx].bump(at, self.window_secs);
        if !success {
            self.failures[idx].bump(at, self.window_secs);
        }
    }

    /// Requests and failures in buckets younger than one window.
    pub fn totals(&self, now: u64) -> (u64, u64) {
        let sum = |cells: &[Cell; CELLS]| -> u64 {
            cells
                .iter()
                .map(|cell| cell.live_value(now, self.window_secs))
                .sum()
        };
        (sum(&self.requests), sum(&self.failures))
    }

    /// Trailing failure percentage, or `None` below [`MIN_SAMPLES`] requests.
    pub fn failure_percent(&self, now: u64) -> Option<u8> {
        let (requests, failures) = self.totals(now);
        if requests < MIN_SAMPLES {
            return None;
        }
        Some(percent(failures, requests))
    }
}

enum Ingest {
    Outcome { success: bool, at: u64 },
    Settle(oneshot::Sender<()>),
    Totals { at: u64, reply: oneshot::Sender<(u64, u64)> },
}

const REQUEST_UNIT: u64 = 1 << 32;

/// Probe requests (high half) and failures (low half) packed in one word.
#[derive(Debug, Default)]
struct ProbeTally(AtomicU64);

impl ProbeTally {
    /// Count one probe outcome. When it completes a cycle of `budget` outcomes
    /// the tally is zeroed in the same atomic step and the cycle's
    /// `(requests, failures)` are returned.
    fn record(&self, success: bool, budget: u32) -> Option<(u32, u32)> {
        let step = REQUEST_UNIT + u64::from(!success);
        let budget = u64::from(budget);
        let prev = match self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
            let next = cur + step;
            Some(if next >> 32 >= budget { 0 } else { next })
        }) {
            Ok(prev) | Err(prev) => prev,
        };
        let next = prev + step;
        let requests = next >> 32;
        (requests >= budget).then_some((requests as u32, next as u32))
    }

    fn load(&self) -> (u32, u32) {
        let cur = self.0.load(Ordering::Acquire);
        ((cur >> 32) as u32, cur as u32)
    }
}

/// Failure-rate counter and status holder for one breaker.
pub struct SlidingWindowCounter {
    name: String,
    status: Arc<StatusFlag>,
    queue: mpsc::Sender<Ingest>,
    probe: ProbeTally,
    probe_budget: u32,
    probe_error_percent_threshold: u8,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowCounter {
    /// Create a counter and start its ingestion worker.
    ///
    /// `settings` must already be normalized and validated.
    pub fn new(settings: &BreakerSettings, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        Self::start(settings, clock, |name, job| {
            thread::Builder::new().name(name).spawn(job).map(drop)
        })
    }

    fn start<S>(
        settings: &BreakerSettings,
        clock: Arc<dyn Clock>,
        spawn: S,
    ) -> Result<Self, ConfigError>
    where
        S: FnOnce(String, Box<dyn FnOnce() + Send>) -> io::Result<()>,
    {
        let status = Arc::new(StatusFlag::default());
        let (queue, rx) = mpsc::channel(settings.queue_capacity.max(1));

        let worker = Worker {
            name: settings.name.clone(),
            window: Window::new(settings.interval_secs),
            error_percent_threshold: settings.error_percent_threshold,
            status: status.clone(),
        };
        spawn(
            format!("breaker-{}", settings.name),
            Box::new(move || worker.run(rx)),
        )
        .map_err(|e| {
            tracing::error!(breaker = %settings.name, error = %e, "Failed to start ingestion worker");
            ConfigError::WorkerSpawn {
                name: settings.name.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            name: settings.name.clone(),
            status,
            queue,
            probe: ProbeTally::default(),
            probe_budget: settings.probe_budget,
            probe_error_percent_threshold: settings.probe_error_percent_threshold,
            clock,
        })
    }

    /// Queue a trailing-window outcome. Waits only while the queue is full.
    pub async fn record_outcome(&self, success: bool) {
        let at = self.clock.now_secs();
        if self.queue.send(Ingest::Outcome { success, at }).await.is_err() {
            tracing::error!(breaker = %self.name, "Ingestion worker gone, outcome dropped");
        }
    }

    /// Count a probe outcome. Returns `true` when it completed a probe cycle,
    /// in which case the status has already been decided.
    pub fn record_probe_outcome(&self, success: bool) -> bool {
        let Some((requests, failures)) = self.probe.record(success, self.probe_budget) else {
            return false;
        };

        let failure_percent = percent(u64::from(failures), u64::from(requests));
        let decision = if failure_percent >= self.probe_error_percent_threshold {
            Status::Open
        } else {
            Status::Closed
        };
        let previous = self.status.swap(decision);

        tracing::info!(
            breaker = %self.name,
            requests,
            failures,
            failure_percent,
            decision = %decision,
            "Probe cycle complete"
        );
        metrics::record_probe_cycle(&self.name, decision);
        if previous != decision {
            metrics::record_transition(&self.name, decision);
        }
        true
    }

    pub fn status(&self) -> Status {
        self.status.load()
    }

    /// Probe requests and failures counted so far in the current cycle.
    pub fn probe_counts(&self) -> (u32, u32) {
        self.probe.load()
    }

    /// Resolves once every outcome queued before this call has been applied.
    pub async fn settle(&self) {
        let (done, applied) = oneshot::channel();
        if self.queue.send(Ingest::Settle(done)).await.is_ok() {
            let _ = applied.await;
        }
    }

    /// Trailing-window `(requests, failures)` after every outcome queued before
    /// this call has been applied. `(0, 0)` once the worker is gone.
    pub async fn totals(&self) -> (u64, u64) {
        let (reply, totals) = oneshot::channel();
        let at = self.clock.now_secs();
        if self.queue.send(Ingest::Totals { at, reply }).await.is_err() {
            return (0, 0);
        }
        totals.await.unwrap_or_default()
    }
}

impl std::fmt::Debug for SlidingWindowCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowCounter")
            .field("name", &self.name)
            .field("status", &self.status.load())
            .field("probe", &self.probe.load())
            .finish()
    }
}

struct Worker {
    name: String,
    window: Window,
    error_percent_threshold: u8,
    status: Arc<StatusFlag>,
}

impl Worker {
    fn run(mut self, mut rx: mpsc::Receiver<Ingest>) {
        while let Some(msg) = rx.blocking_recv() {
            match msg {
                Ingest::Outcome { success, at } => self.apply(success, at),
                Ingest::Settle(done) => {
                    let _ = done.send(());
                }
                Ingest::Totals { at, reply } => {
                    let _ = reply.send(self.window.totals(at));
                }
            }
        }
        tracing::debug!(breaker = %self.name, "Ingestion worker stopped");
    }

    fn apply(&mut self, success: bool, at: u64) {
        self.window.record(at, success);
        if success {
            return;
        }
        let Some(failure_percent) = self.window.failure_percent(at) else {
            return;
        };
        if failure_percent >= self.error_percent_threshold
            && self.status.swap(Status::Open) == Status::Closed
        {
            tracing::warn!(
                breaker = %self.name,
                failure_percent,
                threshold = self.error_percent_threshold,
                "Breaker opened"
            );
            metrics::record_transition(&self.name, Status::Open);
        }
    }
}
