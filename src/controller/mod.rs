//! # Controller
//!
//! Core controller modules for the Token rotation controller.
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//! - `events`: Kubernetes Event publishing
//! - `limiter`: keyed debounce for fire-and-forget side effects
//! - `reconciler`: finalizer, status and rotation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod events;
pub mod limiter;
pub mod reconciler;
pub mod server;
