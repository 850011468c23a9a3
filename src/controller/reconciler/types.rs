//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::events::EventPublisher;
use crate::controller::limiter::RateLimiter;
use crate::controller::reconciler::store::{StoreError, TokenStore};
use crate::crd::Token;
use chrono::{DateTime, Utc};
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("finalizer {finalizer} not found on Token {key}")]
    FinalizerNotFound { finalizer: &'static str, key: String },
    #[error("Token is missing metadata.{0}")]
    MissingField(&'static str),
    #[error("timestamp out of range: {0}")]
    Timestamp(String),
}

impl ReconcilerError {
    /// Conflicts are expected under concurrent writers and retried quickly
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcilerError::Store(e) if e.is_conflict())
    }

    /// Short label used for metrics and log fields
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::Store(StoreError::Conflict { .. }) => "conflict",
            ReconcilerError::Store(StoreError::AlreadyExists { .. }) => "already-exists",
            ReconcilerError::Store(_) => "store",
            ReconcilerError::FinalizerNotFound { .. } | ReconcilerError::MissingField(_) => {
                "invariant"
            }
            ReconcilerError::Timestamp(_) => "timestamp",
        }
    }
}

/// Result of one step of a reconcile pass
///
/// `Mutated` ends the pass early: the write produces a fresh watch event and the
/// next pass starts from the stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum StepOutcome {
    Unchanged,
    Mutated,
}

impl StepOutcome {
    #[must_use]
    pub fn is_mutated(self) -> bool {
        self == StepOutcome::Mutated
    }
}

/// Source of the current time for step logic
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn TokenStore>,
    pub events: Arc<dyn EventPublisher>,
    pub clock: Arc<dyn Clock>,
    pub config: ControllerConfig,
    // Debounces events per Token and reason
    pub limiter: Arc<RateLimiter>,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        events: Arc<dyn EventPublisher>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            events,
            clock: Arc::new(SystemClock),
            config,
            limiter: Arc::new(RateLimiter::new()),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish an event on `token`, at most once per debounce interval per reason
    ///
    /// `subject` narrows the debounce key, so events about different secrets
    /// are never folded into one. Returns whether the event was scheduled.
    pub fn notify(
        &self,
        token: &Token,
        type_: EventType,
        reason: &'static str,
        action: &'static str,
        subject: Option<&str>,
        note: String,
    ) -> bool {
        let mut key = format!(
            "{}/{}/{reason}",
            token.namespace().unwrap_or_default(),
            token.name_any()
        );
        if let Some(subject) = subject {
            key.push('/');
            key.push_str(subject);
        }
        let reference = token.object_ref(&());
        let events = Arc::clone(&self.events);
        self.limiter.run_at_most_once(
            &key,
            self.config.event_debounce_duration(),
            async move {
                events
                    .publish(&reference, type_, reason, action, Some(note))
                    .await;
            },
        )
    }

    /// Record a failure for `resource_key` and return (next delay in seconds, error count)
    pub fn next_error_backoff(&self, resource_key: &str) -> (u64, u32) {
        let mut states = match self.backoff_states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = states
            .entry(resource_key.to_string())
            .or_insert_with(|| {
                BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
            });
        state.increment_error();
        (state.backoff.next_backoff_seconds(), state.error_count)
    }

    /// Forget the failure history of `resource_key`; returns whether it was backing off
    pub fn reset_backoff(&self, resource_key: &str) -> bool {
        let mut states = match self.backoff_states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        states
            .remove(resource_key)
            .is_some_and(|state| state.error_count > 0)
    }
}
