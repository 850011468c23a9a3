//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use token_rotation_controller::prelude::*;
//! ```

// CRD types - most commonly used
pub use crate::crd::*;

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, reconcile_token, BackoffState, Clock, KubeStore, Reconciler, ReconcilerError,
    StepOutcome, StoreError, SystemClock, TokenStore,
};

// Event publishing
pub use crate::controller::events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};

// Config types - for configuration management
pub use crate::config::{ControllerConfig, ServerConfig};

// Admission policies
pub use crate::webhook::{default_spec, validate_spec, ValidationError};
