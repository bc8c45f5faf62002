//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Probing: derived, never stored; Open and `now >= next_probe_at`
//!
//! # State Transitions
//! ```text
//! Closed → Open: trailing failure % >= threshold (>= 10 samples in window)
//! Open → Probing: sleep window elapsed since the last closed-state call
//! Probing → Closed: probe-cycle failure % < probe threshold
//! Probing → Open: probe-cycle failure % >= probe threshold (tickets refilled)
//! ```
//!
//! # Design Decisions
//! - Per-dependency circuit breaker (not global)
//! - Fail fast in Open state; rejection goes to the fallback, never the return value
//! - At most `probe_budget` concurrent probes, gated by the ticket pool
//! - Every closed-state outcome pushes `next_probe_at` forward, so the cool-down
//!   counts from the most recent call rather than from the moment of opening
//! - A completed probe cycle pushes `next_probe_at` before refilling tickets
//! - Outcomes are classified by status at completion, not at admission. A call
//!   admitted while Closed that finishes after the breaker opened and the sleep
//!   window elapsed counts toward the probe cycle without holding a ticket. The
//!   cycle then completes with tickets left over, `release_all` is a no-op, and
//!   the next cycle starts short. Keep protected calls well under `sleep_window_secs`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::schema::BreakerSettings;
use crate::config::validation::{validate_settings, ConfigError};
use crate::observability::metrics::{self, CallOutcome};
use crate::resilience::clock::Clock;
use crate::resilience::error::{notify, Fallback, FallbackCause, RejectReason, RejectedError};
use crate::resilience::status::Status;
use crate::resilience::tickets::TicketPool;
use crate::resilience::window::SlidingWindowCounter;

/// Outcome of the before-call gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed: run the call.
    Allow,
    /// Open and cooling down: do not run.
    Reject,
    /// Open and cooled down: run only with a probe ticket.
    ProbeEligible,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub status: Status,
    pub next_probe_at: u64,
    pub tickets_remaining: usize,
    pub probe_requests: u32,
    pub probe_failures: u32,
    pub settings: BreakerSettings,
}

/// A named breaker guarding one dependency.
#[derive(Debug)]
pub struct Breaker {
    settings: BreakerSettings,
    next_probe_at: AtomicU64,
    counter: SlidingWindowCounter,
    tickets: TicketPool,
    clock: Arc<dyn Clock>,
}

impl Breaker {
    /// Validate `settings` (unset fields take defaults) and build a closed breaker.
    pub fn from_settings(
        settings: BreakerSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let settings = settings.normalized();
        validate_settings(&settings)?;

        let counter = SlidingWindowCounter::new(&settings, clock.clone())?;
        let tickets = TicketPool::new(settings.probe_budget as usize);
        let next_probe_at = AtomicU64::new(clock.now_secs() + settings.sleep_window_secs);

        tracing::debug!(
            breaker = %settings.name,
            interval_secs = settings.interval_secs,
            sleep_window_secs = settings.sleep_window_secs,
            probe_budget = settings.probe_budget,
            "Breaker created"
        );
        metrics::record_status(&settings.name, Status::Closed);

        Ok(Self {
            settings,
            next_probe_at,
            counter,
            tickets,
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    pub fn status(&self) -> Status {
        self.counter.status()
    }

    pub fn counter(&self) -> &SlidingWindowCounter {
        &self.counter
    }

    pub fn tickets(&self) -> &TicketPool {
        &self.tickets
    }

    /// Absolute time (epoch seconds) from which a probe is allowed.
    pub fn next_probe_at(&self) -> u64 {
        self.next_probe_at.load(Ordering::Acquire)
    }

    fn probe_due(&self) -> bool {
        self.clock.now_secs() >= self.next_probe_at()
    }

    fn push_next_probe(&self) {
        let at = self.clock.now_secs() + self.settings.sleep_window_secs;
        self.next_probe_at.store(at, Ordering::Release);
    }

    /// Before-call gate.
    pub fn admit(&self) -> Admission {
        match self.counter.status() {
            Status::Closed => Admission::Allow,
            Status::Open if self.probe_due() => Admission::ProbeEligible,
            Status::Open => Admission::Reject,
        }
    }

    /// After-call accounting for a call that actually ran.
    pub async fn on_outcome(&self, success: bool) {
        match self.counter.status() {
            Status::Closed => {
                self.push_next_probe();
                self.counter.record_outcome(success).await;
            }
            Status::Open => {
                if self.probe_due() && self.counter.record_probe_outcome(success) {
                    // Timer first: a caller must never see a full pool and a due timer together.
                    self.push_next_probe();
                    self.tickets.release_all();
                }
            }
        }
    }

    /// Reject without running.
    pub fn on_reject<E>(&self, fallback: Option<&Fallback<'_, E>>) {
        self.reject(RejectReason::Open, fallback);
    }

    fn reject<E>(&self, reason: RejectReason, fallback: Option<&Fallback<'_, E>>) {
        tracing::debug!(breaker = %self.name(), ?reason, "Call rejected");
        metrics::record_call(self.name(), CallOutcome::Rejected);
        let err = RejectedError {
            breaker: self.name().to_string(),
            reason,
        };
        notify(fallback, FallbackCause::Rejected(&err));
    }

    /// Run `run` as a probe if a ticket is free, otherwise reject.
    pub async fn on_probe_admission<T, E, Fut>(
        &self,
        run: Fut,
        fallback: Option<&Fallback<'_, E>>,
    ) -> Result<Option<T>, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.tickets.acquire() {
            self.reject(RejectReason::NoProbeTicket, fallback);
            return Ok(None);
        }

        match run.await {
            Ok(value) => {
                metrics::record_call(self.name(), CallOutcome::ProbeSuccess);
                self.on_outcome(true).await;
                Ok(Some(value))
            }
            Err(err) => {
                metrics::record_call(self.name(), CallOutcome::ProbeFailure);
                self.on_outcome(false).await;
                notify(fallback, FallbackCause::Failed(&err));
                Err(err)
            }
        }
    }

    /// Full call protocol: gate, run if admitted, account.
    ///
    /// Returns `Ok(None)` when the call was rejected (the fallback has been told),
    /// `Ok(Some(_))` when it ran and succeeded, and the operation's own error
    /// when it ran and failed.
    pub async fn call<T, E, Fut>(
        &self,
        run: Fut,
        fallback: Option<&Fallback<'_, E>>,
    ) -> Result<Option<T>, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match self.admit() {
            Admission::Allow => match run.await {
                Ok(value) => {
                    metrics::record_call(self.name(), CallOutcome::Success);
                    self.on_outcome(true).await;
                    Ok(Some(value))
                }
                Err(err) => {
                    metrics::record_call(self.name(), CallOutcome::Failure);
                    self.on_outcome(false).await;
                    notify(fallback, FallbackCause::Failed(&err));
                    Err(err)
                }
            },
            Admission::Reject => {
                self.on_reject(fallback);
                Ok(None)
            }
            Admission::ProbeEligible => self.on_probe_admission(run, fallback).await,
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let (probe_requests, probe_failures) = self.counter.probe_counts();
        BreakerSnapshot {
            name: self.settings.name.clone(),
            status: self.status(),
            next_probe_at: self.next_probe_at(),
            tickets_remaining: self.tickets.remaining(),
            probe_requests,
            probe_failures,
            settings: self.settings.clone(),
        }
    }
}

impl BreakerSettings {
    /// Settings builder's single validating step.
    pub fn build(self, clock: Arc<dyn Clock>) -> Result<Breaker, ConfigError> {
        Breaker::from_settings(self, clock)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{OnceLock, Weak};

    use super::*;
    use crate::resilience::clock::ManualClock;

    const T0: u64 = 1_000_000;

    fn breaker(settings: BreakerSettings) -> (Breaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let breaker = Breaker::from_settings(settings, clock.clone()).unwrap();
        (breaker, clock)
    }

    async fn trip(breaker: &Breaker) {
        for _ in 0..10 {
            breaker.on_outcome(false).await;
        }
        breaker.counter().settle().await;
        assert_eq!(breaker.status(), Status::Open);
    }

    #[test]
    fn test_from_settings_rejects_bad_interval() {
        let clock = Arc::new(ManualClock::new(T0));
        let err = Breaker::from_settings(
            BreakerSettings {
                interval_secs: 50,
                ..BreakerSettings::named("db")
            },
            clock,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::IntervalNotDivisible { .. }));
    }

    #[tokio::test]
    async fn test_admission_follows_status_and_timer() {
        let (breaker, clock) = breaker(BreakerSettings::named("admit"));
        assert_eq!(breaker.admit(), Admission::Allow);

        trip(&breaker).await;
        assert_eq!(breaker.admit(), Admission::Reject);

        clock.advance(64);
        assert_eq!(breaker.admit(), Admission::Reject);
        clock.advance(1);
        assert_eq!(breaker.admit(), Admission::ProbeEligible);
    }

    #[tokio::test]
    async fn test_closed_outcome_pushes_probe_time() {
        let (breaker, clock) = breaker(BreakerSettings::named("push"));
        assert_eq!(breaker.next_probe_at(), T0 + 65);

        clock.advance(30);
        breaker.on_outcome(true).await;
        assert_eq!(breaker.next_probe_at(), T0 + 95);

        clock.advance(10);
        breaker.on_outcome(false).await;
        assert_eq!(breaker.next_probe_at(), T0 + 105);
    }

    #[tokio::test]
    async fn test_open_outcome_before_timer_is_ignored() {
        let (breaker, _clock) = breaker(BreakerSettings {
            probe_budget: 2,
            ..BreakerSettings::named("ignored")
        });
        trip(&breaker).await;
        let before = breaker.next_probe_at();

        breaker.on_outcome(true).await;
        breaker.on_outcome(true).await;
        assert_eq!(breaker.counter().probe_counts(), (0, 0));
        assert_eq!(breaker.next_probe_at(), before);
        assert_eq!(breaker.status(), Status::Open);
    }

    #[tokio::test]
    async fn test_probe_cycle_completion_refills_tickets() {
        let (breaker, clock) = breaker(BreakerSettings {
            probe_budget: 2,
            ..BreakerSettings::named("refill")
        });
        trip(&breaker).await;
        clock.advance(65);

        let first: Result<Option<()>, &str> = breaker.call(async { Err("down") }, None).await;
        assert_eq!(first, Err("down"));
        assert_eq!(breaker.tickets().remaining(), 1);

        let second: Result<Option<()>, &str> = breaker.call(async { Err("down") }, None).await;
        assert_eq!(second, Err("down"));
        assert_eq!(breaker.status(), Status::Open);
        assert_eq!(breaker.tickets().remaining(), 2);
        assert_eq!(breaker.next_probe_at(), T0 + 130);
        assert_eq!(breaker.admit(), Admission::Reject);
    }

    #[tokio::test]
    async fn test_probe_without_ticket_is_rejected() {
        let (breaker, clock) = breaker(BreakerSettings {
            probe_budget: 1,
            ..BreakerSettings::named("no-ticket")
        });
        trip(&breaker).await;
        clock.advance(65);
        assert!(breaker.tickets().acquire());

        let ran = std::sync::atomic::AtomicBool::new(false);
        let reasons = std::sync::Mutex::new(Vec::new());
        let fallback: &Fallback<'_, &str> = &|cause| {
            if let FallbackCause::Rejected(err) = cause {
                reasons.lock().unwrap().push(err.reason);
            }
        };
        let result = breaker
            .call(
                async {
                    ran.store(true, Ordering::SeqCst);
                    Ok::<_, &str>(())
                },
                Some(fallback),
            )
            .await;

        assert_eq!(result, Ok(None));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(*reasons.lock().unwrap(), vec![RejectReason::NoProbeTicket]);
    }

    #[tokio::test]
    async fn test_snapshot_reports_state() {
        let (breaker, _clock) = breaker(BreakerSettings::named("snap"));
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.name, "snap");
        assert_eq!(snapshot.status, Status::Closed);
        assert_eq!(snapshot.tickets_remaining, 20);
        assert_eq!(snapshot.next_probe_at, T0 + 65);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "closed");
    }

    /// Clock that runs a competing caller during a chosen `now_secs` read.
    #[derive(Default)]
    struct InterleavingClock {
        now: AtomicU64,
        fire_on: AtomicUsize,
        breaker: OnceLock<Weak<Breaker>>,
        admitted: AtomicUsize,
    }

    impl InterleavingClock {
        /// Let the caller in on the `nth` read from now on.
        fn arm(&self, nth: usize) {
            self.fire_on.store(nth, Ordering::SeqCst);
        }

        fn competing_caller(&self) {
            let Some(breaker) = self.breaker.get().and_then(Weak::upgrade) else {
                return;
            };
            if breaker.admit() == Admission::ProbeEligible && breaker.tickets().acquire() {
                self.admitted.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl Clock for InterleavingClock {
        fn now_secs(&self) -> u64 {
            let fire = self
                .fire_on
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                == Ok(1);
            if fire {
                self.competing_caller();
            }
            self.now.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_cycle_end_pushes_timer_before_refilling_tickets() {
        let clock = Arc::new(InterleavingClock::default());
        clock.now.store(T0, Ordering::SeqCst);
        let breaker = Arc::new(
            Breaker::from_settings(
                BreakerSettings {
                    probe_budget: 4,
                    ..BreakerSettings::named("interleaved")
                },
                clock.clone(),
            )
            .unwrap(),
        );
        clock.breaker.set(Arc::downgrade(&breaker)).unwrap();

        trip(&breaker).await;
        clock.now.fetch_add(65, Ordering::SeqCst);

        for _ in 0..4 {
            assert!(breaker.tickets().acquire());
        }
        for _ in 0..3 {
            breaker.on_outcome(false).await;
        }
        // Read 1 is the due check, read 2 computes the next probe time.
        clock.arm(2);
        breaker.on_outcome(false).await;

        assert_eq!(clock.admitted.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.status(), Status::Open);
        assert_eq!(breaker.tickets().remaining(), 4);
        assert_eq!(breaker.next_probe_at(), T0 + 130);

        // A full budget is available for the next cycle, so it can complete.
        clock.now.fetch_add(65, Ordering::SeqCst);
        for _ in 0..4 {
            let result: Result<Option<()>, &str> = breaker.call(async { Ok(()) }, None).await;
            assert_eq!(result, Ok(Some(())));
        }
        assert_eq!(breaker.status(), Status::Closed);
        assert_eq!(breaker.tickets().remaining(), 4);
        assert_eq!(breaker.counter().probe_counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_closed_call_finishing_after_sleep_window_counts_as_probe() {
        let (breaker, clock) = breaker(BreakerSettings {
            probe_budget: 4,
            ..BreakerSettings::named("slow-call")
        });
        assert_eq!(breaker.admit(), Admission::Allow);

        trip(&breaker).await;
        clock.advance(65);
        breaker.on_outcome(true).await;

        assert_eq!(breaker.counter().probe_counts(), (1, 0));
        assert_eq!(breaker.tickets().remaining(), 4);
    }
}
