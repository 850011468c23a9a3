//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_opt, env_var_or_default};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Steady-state requeue interval after a clean pass (seconds)
    /// Rotation deadlines are only noticed on the next pass, so this bounds rotation lateness
    pub reconcile_requeue_secs: u64,
    /// Fibonacci backoff floor for failed reconciliations (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff ceiling for failed reconciliations (seconds)
    pub backoff_max_secs: u64,
    /// Requeue delay after an optimistic concurrency conflict (seconds)
    pub conflict_requeue_secs: u64,
    /// Minimum interval between two identical events for the same Token (seconds)
    pub event_debounce_secs: u64,
    /// Maximum concurrent reconciliations
    /// Limits how many Tokens can be reconciled simultaneously
    pub max_concurrent_reconciliations: u16,
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            reconcile_requeue_secs: DEFAULT_RECONCILE_REQUEUE_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            conflict_requeue_secs: DEFAULT_CONFLICT_REQUEUE_SECS,
            event_debounce_secs: DEFAULT_EVENT_DEBOUNCE_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_namespace: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            reconcile_requeue_secs: env_var_or_default(
                "RECONCILE_REQUEUE_SECS",
                DEFAULT_RECONCILE_REQUEUE_SECS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            conflict_requeue_secs: env_var_or_default(
                "CONFLICT_REQUEUE_SECS",
                DEFAULT_CONFLICT_REQUEUE_SECS,
            ),
            event_debounce_secs: env_var_or_default(
                "EVENT_DEBOUNCE_SECS",
                DEFAULT_EVENT_DEBOUNCE_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            watch_namespace: env_var_opt("WATCH_NAMESPACE"),
        }
    }

    /// Get steady-state requeue duration
    pub fn reconcile_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconcile_requeue_secs)
    }

    /// Get conflict requeue duration
    pub fn conflict_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.conflict_requeue_secs)
    }

    /// Get event debounce interval
    pub fn event_debounce_duration(&self) -> Duration {
        Duration::from_secs(self.event_debounce_secs)
    }
}
