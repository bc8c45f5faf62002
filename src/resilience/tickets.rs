//! Probe ticket pool.
//!
//! # Responsibilities
//! - Bound the number of concurrent probe calls while a breaker is open
//! - Refill only once a probe cycle has consumed every ticket
//!
//! # Design Decisions
//! - Never blocks: "no ticket" is an immediate answer, not a wait
//! - Refill is a single compare-exchange from zero, so racing resets
//!   cannot push the count past capacity

use std::sync::atomic::{AtomicUsize, Ordering};

/// Non-blocking counting semaphore for probe calls.
#[derive(Debug)]
pub struct TicketPool {
    capacity: usize,
    available: AtomicUsize,
}

impl TicketPool {
    /// Create a full pool.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: AtomicUsize::new(capacity),
        }
    }

    /// Take one ticket if any is left.
    pub fn acquire(&self) -> bool {
        let mut prev = self.available.load(Ordering::Acquire);
        loop {
            if prev == 0 {
                return false;
            }
            match self.available.compare_exchange_weak(
                prev,
                prev - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(x) => prev = x,
            }
        }
    }

    /// Restore the pool to capacity, but only if it is empty.
    ///
    /// Returns `true` if this call performed the refill.
    pub fn release_all(&self) -> bool {
        self.available
            .compare_exchange(0, self.capacity, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current ticket count. Advisory only.
    pub fn remaining(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_until_empty() {
        let pool = TicketPool::new(3);
        assert!(pool.acquire());
        assert!(pool.acquire());
        assert!(pool.acquire());
        assert!(!pool.acquire());
        assert_eq!(pool.remaining(), 0);
    }

    #[test]
    fn test_release_all_only_from_empty() {
        let pool = TicketPool::new(2);
        assert!(pool.acquire());
        assert!(!pool.release_all());
        assert_eq!(pool.remaining(), 1);

        assert!(pool.acquire());
        assert!(pool.release_all());
        assert_eq!(pool.remaining(), 2);
    }

    #[test]
    fn test_concurrent_acquire_never_exceeds_capacity() {
        let pool = Arc::new(TicketPool::new(20));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || (0..100).filter(|_| pool.acquire()).count())
            })
            .collect();

        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 20);
        assert_eq!(pool.remaining(), 0);
    }

    #[test]
    fn test_concurrent_release_all_refills_once() {
        let pool = Arc::new(TicketPool::new(5));
        while pool.acquire() {}

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || pool.release_all())
            })
            .collect();

        let refills = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|refilled| *refilled)
            .count();
        assert_eq!(refills, 1);
        assert_eq!(pool.remaining(), 5);
    }
}
