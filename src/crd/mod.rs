//! # Custom Resource Definitions
//!
//! CRD types for the Token rotation controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - Token resource and its desired state
//! - `status.rs` - Phase, conditions and the active secret reference

mod spec;
mod status;

pub use spec::{Token, TokenSpec};
pub use status::{Condition, Phase, TokenStatus};
