//! Jittered exponential backoff for reconnection attempts.
//!
//! The delay ceiling doubles on every failure and is clamped to
//! `[min_delay, max_delay]` (1s..60s by default). Time spent running
//! successfully between failures is credited against the ceiling, so a
//! long-lived connection that finally drops does not pay the full penalty
//! accumulated by earlier flapping.
//!
//! The actual wait is drawn uniformly from `[0, ceiling)` ("full jitter")
//! to avoid synchronized retries across many clients.
//!
//! # Backoff Schedule (no credit)
//!
//! ```text
//! Failure  Ceiling
//! -------  -------
//! 1        1s
//! 2        2s
//! 3        4s
//! ...
//! 7        60s      (clamped, stays here)
//! ```
//!
//! State is per stream instance, not global, and is reset only by creating
//! a new stream.

use rand::Rng;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Stateful backoff tracker for one stream instance.
#[derive(Debug)]
pub struct Backoff {
    delay: Duration,
    last_failure: Option<Instant>,
    min_delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    /// Create a backoff tracker with the given delay bounds.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            last_failure: None,
            min_delay,
            max_delay,
        }
    }

    /// Record a failure and wait out the jittered delay.
    ///
    /// Returns `false` if cancellation was signalled before the wait
    /// finished, `true` otherwise.
    pub async fn failure(&mut self, cancel: &mut watch::Receiver<bool>) -> bool {
        let ceiling = self.next_ceiling();
        let wait = jitter(ceiling);
        tracing::debug!(ceiling_ms = ceiling.as_millis() as u64, wait_ms = wait.as_millis() as u64, "backing off");

        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = crate::cancelled(cancel) => false,
        }
    }

    /// Advance the ceiling for a failure happening now.
    pub fn next_ceiling(&mut self) -> Duration {
        let elapsed = self
            .last_failure
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO);
        self.last_failure = Some(Instant::now());
        self.advance(elapsed)
    }

    /// Credit the elapsed time since the previous failure, double, bound.
    ///
    /// The min bound is applied first, then the max bound, so the max wins
    /// if a caller supplies crossed bounds.
    fn advance(&mut self, since_last_failure: Duration) -> Duration {
        self.delay = self.delay.saturating_sub(since_last_failure) * 2;
        self.delay = self.delay.max(self.min_delay).min(self.max_delay);
        self.delay
    }
}

/// Full jitter: uniform draw from `[0, ceiling)`.
fn jitter(ceiling: Duration) -> Duration {
    if ceiling.is_zero() {
        return Duration::ZERO;
    }
    rand::thread_rng().gen_range(Duration::ZERO..ceiling)
}
