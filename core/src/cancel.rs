//! Cooperative cancellation for blocking transport calls.
//!
//! A `Cancellation` combines a shared stop flag with a per-phase deadline.
//! Transports poll `is_requested` between partial reads and writes; the
//! engine derives one value for the connect phase and a fresh one for the
//! transfer phase so each phase gets its own time budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag raised when the owning client shuts down.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Poll-able cancellation predicate for one phase of a request.
#[derive(Debug, Clone)]
pub struct Cancellation {
    stop: StopFlag,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Start a new budget of `timeout_ms` from now. A non-positive timeout
    /// never expires; only the stop flag can cancel.
    pub fn with_timeout(timeout_ms: i64, stop: &StopFlag) -> Self {
        let deadline = u64::try_from(timeout_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        Self {
            stop: stop.clone(),
            deadline,
        }
    }

    /// A predicate with no deadline and a private, never-raised flag.
    pub fn never() -> Self {
        Self {
            stop: StopFlag::new(),
            deadline: None,
        }
    }

    pub fn is_requested(&self) -> bool {
        if self.stop.is_raised() {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
