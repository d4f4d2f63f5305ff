//! Retry Scheduler - single-slot deferred restart
//!
//! At most one retry is ever pending. The actual clock lives behind
//! [`RetryTimer`] so the same scheduler runs on tokio, in the browser and
//! under a hand-driven timer in tests.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Identity of one armed retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetryToken(pub u64);

impl std::fmt::Display for RetryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "retry-{}", self.0)
    }
}

/// The clock refused to schedule a retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerUnavailable(pub String);

impl std::fmt::Display for TimerUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "retry timer unavailable: {}", self.0)
    }
}

impl std::error::Error for TimerUnavailable {}

/// Clock seam used by the scheduler
///
/// When `schedule` returns `Ok` it must eventually deliver
/// `PlayerEvent::RetryFired(token)` to the controller unless `cancel(token)`
/// is called first. Delivering an expiry for a cancelled token is allowed;
/// the scheduler ignores it. `Err` means nothing will fire.
pub trait RetryTimer {
    fn schedule(&mut self, delay: Duration, token: RetryToken) -> Result<(), TimerUnavailable>;
    fn cancel(&mut self, token: RetryToken);
}

/// Single-slot retry timer
pub struct RetryScheduler {
    delay: Duration,
    pending: Option<RetryToken>,
    next_token: u64,
    timer: Box<dyn RetryTimer>,
}

impl RetryScheduler {
    pub fn new(delay: Duration, timer: Box<dyn RetryTimer>) -> Self {
        Self {
            delay,
            pending: None,
            next_token: 0,
            timer,
        }
    }

    /// Fixed delay between arming and firing
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Token of the pending retry, if any
    pub fn pending(&self) -> Option<RetryToken> {
        self.pending
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm the retry. Returns false when one is already pending or the
    /// timer could not schedule it; in the latter case the slot stays empty
    /// and only a liveness report can restart playback.
    pub fn arm(&mut self) -> bool {
        if let Some(token) = self.pending {
            debug!(%token, "Retry already armed");
            return false;
        }

        self.next_token += 1;
        let token = RetryToken(self.next_token);
        if let Err(e) = self.timer.schedule(self.delay, token) {
            warn!(%token, error = %e, "Retry not armed");
            return false;
        }
        self.pending = Some(token);

        debug!(%token, delay_ms = self.delay.as_millis() as u64, "Retry armed");
        true
    }

    /// Cancel the pending retry. Returns false when none was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(token) => {
                self.timer.cancel(token);
                debug!(%token, "Retry cancelled");
                true
            }
            None => false,
        }
    }

    /// Consume an expiry.
    ///
    /// Clears the slot and returns true only if `token` is the pending one;
    /// expiries of cancelled or superseded retries return false.
    pub fn fire(&mut self, token: RetryToken) -> bool {
        if self.pending == Some(token) {
            self.pending = None;
            true
        } else {
            debug!(%token, "Ignoring expiry of stale retry");
            false
        }
    }
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("delay", &self.delay)
            .field("pending", &self.pending)
            .finish()
    }
}
