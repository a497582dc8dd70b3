//! Circuit breaker for operations that may fail persistently.
//!
//! States: `Healthy ⇄ Degraded → GivenUp`. A detector gives up after
//! [`MAX_FAILURES`] failures that each arrive between [`MIN_INTERVAL`] and
//! [`MAX_INTERVAL`] after the previous one, or immediately on [`fatal`].
//! Only [`success`] leaves the given-up state.
//!
//! [`fatal`]: FailureDetector::fatal
//! [`success`]: FailureDetector::success

use std::time::{Duration, Instant};

/// Consecutive qualifying failures that trip the detector.
pub const MAX_FAILURES: u32 = 3;

/// Failures closer together than this are a tight retry loop and ignored.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Failures further apart than this start a new episode.
pub const MAX_INTERVAL: Duration = Duration::from_millis(10_000);

/// Tracks consecutive failures of one named operation.
#[derive(Debug, Clone)]
pub struct FailureDetector {
    name: String,
    last_failure: Option<Instant>,
    count: u32,
    gave_up: bool,
}

impl FailureDetector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_failure: None,
            count: 0,
            gave_up: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Report a successful operation; clears every counter.
    pub fn success(&mut self) {
        if self.gave_up {
            tracing::info!(operation = %self.name, "resetting failure condition");
        }
        self.last_failure = None;
        self.count = 0;
        self.gave_up = false;
    }

    /// Report a failed operation at the current time.
    pub fn failure(&mut self) {
        self.failure_at(Instant::now());
    }

    /// Report a failed operation observed at `now`.
    pub fn failure_at(&mut self, now: Instant) {
        let Some(last) = self.last_failure else {
            self.last_failure = Some(now);
            self.count = 1;
            return;
        };

        let delta = now.saturating_duration_since(last);
        if delta < MIN_INTERVAL {
            return;
        }
        if delta > MAX_INTERVAL {
            self.last_failure = Some(now);
            return;
        }

        self.last_failure = Some(now);
        self.count += 1;
        if self.count >= MAX_FAILURES && !self.gave_up {
            tracing::warn!(
                operation = %self.name,
                failures = self.count,
                "too many failures, giving up"
            );
            self.gave_up = true;
        }
    }

    /// Give up immediately; the caller knows the condition will not clear.
    pub fn fatal(&mut self) {
        self.last_failure = None;
        self.count = 0;
        if !self.gave_up {
            tracing::warn!(operation = %self.name, "fatal failure, giving up");
        }
        self.gave_up = true;
    }

    /// `true` when retrying is pointless until the next [`success`](Self::success).
    pub fn give_up(&self) -> bool {
        self.gave_up
    }

    /// Qualifying failures counted in the current episode.
    pub fn consecutive_failures(&self) -> u32 {
        self.count
    }
}
