//! # Rate Limiter
//!
//! Keyed debounce for side effects that must not fire more than once per interval,
//! such as publishing the same Kubernetes Event for a Token on every retry.
//!
//! The action is spawned detached. Its completion is neither awaited nor ordered
//! relative to the caller, and suppression is not an error.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct RateLimiter {
    last_run: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `action` unless it already ran for `key` less than `every` ago
    ///
    /// Returns whether the action was scheduled. The lock covers both the check and
    /// the record of the new run time, never the action itself.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run_at_most_once<F>(&self, key: &str, every: Duration, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut last_run = match self.last_run.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        let due = last_run
            .get(key)
            .is_none_or(|last| now.saturating_duration_since(*last) >= every);
        if due {
            tokio::spawn(action);
            last_run.insert(key.to_string(), now);
        }
        due
    }

    /// Drop entries whose interval has long passed
    ///
    /// Keys are per Token, so deleted Tokens would otherwise linger forever.
    pub fn prune_older_than(&self, age: Duration) {
        let mut last_run = match self.last_run.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        last_run.retain(|_, last| now.saturating_duration_since(*last) < age);
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        match self.last_run.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
