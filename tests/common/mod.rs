//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use breaker_guard::{
    BreakerSettings, CallError, FallbackCause, ManualClock, RejectReason, Registry, Status,
};
use thiserror::Error;

/// Arbitrary start time for the manual clock.
pub const T0: u64 = 1_000_000;

/// Error returned by the simulated dependency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency failed: {0}")]
pub struct DependencyError(pub &'static str);

/// Registry with a hand-driven clock and the given template for new breakers.
pub fn registry_with(template: BreakerSettings) -> (Registry, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    (Registry::new(template, clock.clone()), clock)
}

/// Everything the fallback was told.
#[derive(Debug, Default)]
pub struct FallbackLog {
    pub rejected: Mutex<Vec<RejectReason>>,
    pub failed: Mutex<Vec<DependencyError>>,
    pub calls: AtomicUsize,
}

impl FallbackLog {
    pub fn record(&self, cause: FallbackCause<'_, DependencyError>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match cause {
            FallbackCause::Rejected(err) => self.rejected.lock().unwrap().push(err.reason),
            FallbackCause::Failed(err) => self.failed.lock().unwrap().push(err.clone()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rejected(&self) -> Vec<RejectReason> {
        self.rejected.lock().unwrap().clone()
    }

    pub fn failed(&self) -> usize {
        self.failed.lock().unwrap().len()
    }
}

pub async fn succeed() -> Result<u32, DependencyError> {
    Ok(200)
}

pub async fn fail() -> Result<u32, DependencyError> {
    Err(DependencyError("503"))
}

/// Drive `name` open with failing calls and wait for the window worker.
pub async fn trip(registry: &Registry, name: &str) {
    for _ in 0..10 {
        let result = registry.call(name, fail(), None).await;
        assert!(matches!(result, Err(CallError::Operation(_))));
    }
    let breaker = registry.get(name).unwrap();
    breaker.counter().settle().await;
    assert_eq!(breaker.status(), Status::Open);
}
