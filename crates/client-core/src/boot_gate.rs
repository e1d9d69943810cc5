//! One-shot readiness latch with timeout-bounded waits.
//!
//! Subsystems that must not run before one-time startup work has finished (push token
//! registration, deep-link handling, realtime subscriptions) wait on the same gate
//! instead of each polling their own flag. One instance lives for the whole process and
//! is handed to consumers explicitly.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::SyncError;

/// Default interval between readiness checks in `wait_for_complete`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
struct BootLatch {
    complete: bool,
    started_at: Instant,
    completed_after: Option<Duration>,
}

impl BootLatch {
    fn pending() -> Self {
        Self {
            complete: false,
            started_at: Instant::now(),
            completed_after: None,
        }
    }
}

/// Process-wide readiness latch shared by every subsystem that waits on startup.
#[derive(Debug)]
pub struct BootGate {
    latch: Mutex<BootLatch>,
    poll_interval: Duration,
}

impl Default for BootGate {
    fn default() -> Self {
        Self::new()
    }
}

impl BootGate {
    /// Gate polling at the default interval.
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    /// Gate with a custom polling granularity (clamped to at least 1ms).
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            latch: Mutex::new(BootLatch::pending()),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Interval between readiness checks while waiting.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Latch the gate open. Calling this again has no effect.
    pub fn mark_complete(&self) {
        let mut latch = self.lock();
        if latch.complete {
            debug!("boot already complete");
            return;
        }
        let elapsed = latch.started_at.elapsed();
        latch.complete = true;
        latch.completed_after = Some(elapsed);
        info!(elapsed_ms = elapsed.as_millis() as u64, "boot complete");
    }

    /// Non-blocking readiness check.
    pub fn is_complete(&self) -> bool {
        self.lock().complete
    }

    /// Time from gate creation (or last reset) to completion.
    pub fn completed_after(&self) -> Option<Duration> {
        self.lock().completed_after
    }

    /// Time since gate creation (or last reset).
    pub fn elapsed(&self) -> Duration {
        self.lock().started_at.elapsed()
    }

    /// Suspend until the gate opens or `timeout` passes.
    ///
    /// Returns how long the caller waited. Dropping the future abandons the wait with no
    /// side effect.
    pub async fn wait_for_complete(&self, timeout: Duration) -> Result<Duration, SyncError> {
        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            if self.is_complete() {
                return Ok(elapsed);
            }
            if elapsed >= timeout {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    timeout_ms = timeout.as_millis() as u64,
                    "boot wait timed out"
                );
                return Err(SyncError::BootTimeout { elapsed, timeout });
            }
            tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Return to pending and restart the clock. Only meant for test isolation.
    pub fn reset(&self) {
        *self.lock() = BootLatch::pending();
    }

    fn lock(&self) -> MutexGuard<'_, BootLatch> {
        self.latch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
