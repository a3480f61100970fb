//! # Retry Policy
//!
//! Exponential backoff for remote git and object-storage operations. Only
//! errors classified as transient are retried; definite rejections
//! propagate immediately. Sleeps never extend past the caller's deadline.

use std::time::{Duration, Instant};

use log::debug;

use crate::error::{Error, Result};

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_factor: u32,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl RetryOptions {
    /// The push policy: base 500 ms, factor 2, up to 6 attempts, capped at
    /// 30 s per delay.
    pub fn push_defaults() -> Self {
        RetryOptions {
            max_attempts: 6,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2,
            max_delay: Duration::from_secs(30),
        }
    }

    fn delay_for(&self, completed_attempts: u32) -> Duration {
        let factor = self
            .backoff_factor
            .saturating_pow(completed_attempts.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Run `operation`, retrying transient failures with exponential backoff.
///
/// `deadline`, when set, bounds the whole loop: no sleep extends past it,
/// and once it is reached the last error is returned.
pub fn with_retry<T, F>(
    options: &RetryOptions,
    deadline: Option<Instant>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match operation() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_transient() || attempt >= options.max_attempts {
            return Err(err);
        }

        let mut delay = options.delay_for(attempt);
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(err);
            }
            delay = delay.min(remaining);
        }
        debug!(
            "attempt {}/{} failed ({}), retrying in {:?}",
            attempt, options.max_attempts, err, delay
        );
        std::thread::sleep(delay);
    }
}

/// A deadline `duration` from now.
pub fn deadline_after(duration: Duration) -> Instant {
    Instant::now() + duration
}

/// The earlier of two optional deadlines.
pub fn earlier_deadline(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Whether a deadline has passed.
pub fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
