//! # Exponential Backoff
//!
//! Delay sequence for the two retry loops of a sync run:
//! - conflict retry on control-plane updates: 100ms, 200ms, 400ms, ... capped at 2s;
//! - exporter credential wait: 1s, 2s, 4s, 8s, then 10s.
//!
//! The delay doubles after every step and never exceeds the cap.

use std::time::Duration;

/// Attempts made for an update that keeps hitting conflicts
pub const CONFLICT_RETRY_ATTEMPTS: u32 = 10;
/// First delay after a conflict
pub const CONFLICT_RETRY_BASE: Duration = Duration::from_millis(100);
/// Longest delay between conflict retries
pub const CONFLICT_RETRY_MAX: Duration = Duration::from_secs(2);

/// Polls for issued exporter credentials
pub const CREDENTIAL_WAIT_ATTEMPTS: u32 = 10;
/// First delay between credential polls
pub const CREDENTIAL_WAIT_BASE: Duration = Duration::from_secs(1);
/// Longest delay between credential polls
pub const CREDENTIAL_WAIT_MAX: Duration = Duration::from_secs(10);

/// Exponential backoff calculator
///
/// Each call to [`next_backoff`](Self::next_backoff) returns the current delay
/// and doubles it for the next call, saturating at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay returned by the next call
    current: Duration,
    /// Upper bound
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `base` and capped at `max`
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            current: base.min(max),
            max,
        }
    }

    /// Backoff used between conflicting updates
    #[must_use]
    pub fn conflict_retry() -> Self {
        Self::new(CONFLICT_RETRY_BASE, CONFLICT_RETRY_MAX)
    }

    /// Backoff used while waiting for exporter credentials
    #[must_use]
    pub fn credential_wait() -> Self {
        Self::new(CREDENTIAL_WAIT_BASE, CREDENTIAL_WAIT_MAX)
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        result
    }
}
