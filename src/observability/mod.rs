//! # Observability
//!
//! - `metrics`: Prometheus metrics collection

pub mod metrics;
