//! # Runtime
//!
//! Process-level wiring around the reconciler.
//!
//! - `error_policy`: requeue decisions for failed reconciliations
//! - `initialization`: tracing, metrics, servers and Kubernetes client setup
//! - `watch_loop`: the `kube_runtime::Controller` driving reconciles

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
