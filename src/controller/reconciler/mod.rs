//! # Reconciler
//!
//! Core reconciliation logic for `Token` resources.
//!
//! The reconciler:
//! - Guards every Token with a finalizer before acting on it
//! - Drives status through `pending`, `ready` and `terminating`
//! - Issues service account token secrets and rotates them on schedule
//! - Deletes rotated-out secrets once their grace period has elapsed
//!
//! All cluster access goes through [`TokenStore`], and the current time comes
//! from the reconciler's [`Clock`].

pub mod finalizer;
pub mod reconcile;
pub mod rotation;
pub mod status;
pub mod store;
pub mod types;
pub mod utils;

// Re-export public API
pub use reconcile::{reconcile, reconcile_token};
pub use store::{KubeStore, StoreError, TokenStore};
pub use types::{
    BackoffState, Clock, Reconciler, ReconcilerError, StepOutcome, SystemClock,
};

// Re-export utility functions for external use (including tests)
pub use utils::{construct_secret_name, from_k8s_time, to_k8s_time};
