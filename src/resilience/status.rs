//! Breaker status flag.
//!
//! The only state callers consult when gating calls. Writers publish with
//! `Release` and readers observe with `Acquire`, so a caller that sees `Open`
//! also sees whatever the writer did before flipping it.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Status enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Closed = 0,
    Open = 1,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Closed => "closed",
            Status::Open => "open",
        }
    }
}

impl From<u8> for Status {
    fn from(val: u8) -> Self {
        match val {
            1 => Status::Open,
            _ => Status::Closed,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic CLOSED/OPEN flag.
#[derive(Debug)]
pub struct StatusFlag(AtomicU8);

impl StatusFlag {
    pub fn new(status: Status) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub fn load(&self) -> Status {
        Status::from(self.0.load(Ordering::Acquire))
    }

    /// Store `status`, returning the previous value.
    pub fn swap(&self, status: Status) -> Status {
        Status::from(self.0.swap(status as u8, Ordering::AcqRel))
    }
}

impl Default for StatusFlag {
    fn default() -> Self {
        Self::new(Status::Closed)
    }
}
