//! # Fibonacci Backoff
//!
//! Requeue delays for Deployments whose reconciliation keeps failing. The
//! delay grows along the Fibonacci sequence, more slowly than exponential
//! backoff, and is capped.
//!
//! Default sequence: 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s, 275s, 300s (max).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Shortest requeue delay after a failure
pub const MIN_BACKOFF: Duration = Duration::from_secs(5);

/// Longest requeue delay after repeated failures
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, starting with the minimum
/// twice.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a backoff between `min` and `max`, in whole seconds
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min_secs: min.as_secs(),
            prev_secs: 0,
            current_secs: min.as_secs(),
            max_secs: max.as_secs(),
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_secs;
        let next = self.prev_secs + self.current_secs;
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        Duration::from_secs(result)
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(MIN_BACKOFF, MAX_BACKOFF)
    }
}

/// Backoff state per Deployment name
#[derive(Debug, Default)]
pub struct BackoffTracker {
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl BackoffTracker {
    /// Delay before retrying `name` after another failure
    pub fn next_backoff(&self, name: &str) -> Duration {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        states.entry(name.to_string()).or_default().next_backoff()
    }

    /// Forget the failures of `name` after a success
    pub fn reset(&self, name: &str) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        states.remove(name);
    }
}
