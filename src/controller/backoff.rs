//! # Fibonacci Backoff
//!
//! Progressive retry intervals for resources that keep failing for reasons
//! only the operator can fix (missing secret, missing token key).
//!
//! The sequence is `min * fib(n)`: with a one minute minimum that is
//! 1m, 1m, 2m, 3m, 5m, 8m, ... capped at `max`.

use std::time::{Duration, Instant};

/// Fibonacci backoff generator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    /// Create a backoff between `min_secs` and `max_secs`
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            previous: 0,
            current: 1,
        }
    }

    /// Next interval in seconds, advancing the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let seconds = self
            .current
            .saturating_mul(self.min_secs)
            .min(self.max_secs);

        if seconds < self.max_secs {
            let next = self.previous.saturating_add(self.current);
            self.previous = self.current;
            self.current = next;
        }
        seconds
    }

    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Restart the sequence from the minimum
    pub fn reset(&mut self) {
        self.previous = 0;
        self.current = 1;
    }

    /// Interval for the `error_count`-th consecutive error (0-indexed)
    pub fn calculate_for_error_count(error_count: u32, min_secs: u64, max_secs: u64) -> Duration {
        let mut backoff = Self::new(min_secs, max_secs);
        let mut seconds = backoff.next_backoff_seconds();
        for _ in 0..error_count {
            seconds = backoff.next_backoff_seconds();
        }
        Duration::from_secs(seconds)
    }
}

/// Backoff progress for a single resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
    pub last_error: Option<Instant>,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
            last_error: None,
        }
    }

    /// Record a failure and return the interval to wait before retrying
    pub fn next_after_error(&mut self) -> Duration {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Some(Instant::now());
        self.backoff.next_backoff()
    }

    pub fn reset(&mut self) {
        self.backoff.reset();
        self.error_count = 0;
        self.last_error = None;
    }
}
