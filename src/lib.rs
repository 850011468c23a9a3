//! Token Rotation Controller Library
//!
//! Issues service account token secrets for `Token` resources and rotates them
//! on a schedule, deleting rotated-out secrets after a grace period.
//!
//! ## Quick Start
//!
//! ```rust
//! use token_rotation_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod webhook;
