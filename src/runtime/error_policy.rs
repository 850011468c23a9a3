//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.

use crate::controller::events::{actions, reasons};
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::Token;
use crate::observability;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing Token does not slow
/// down the others. Conflicts skip the backoff entirely: the object changed
/// under us and a fresh read almost always succeeds.
pub fn handle_reconciliation_error(
    obj: Arc<Token>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "token.reconcile.error",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error.kind = error.kind(),
        error = %error
    );
    let _error_guard = error_span.enter();

    observability::metrics::increment_reconciliation_errors();

    if error.is_conflict() {
        let delay = ctx.config.conflict_requeue_duration();
        info!(
            requeue_secs = delay.as_secs(),
            "Token was modified concurrently, retrying"
        );
        observability::metrics::increment_requeues_total("conflict");
        return Action::requeue(delay);
    }

    error!("Reconciliation error for {}/{}: {:?}", namespace, name, error);
    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = ctx.next_error_backoff(&resource_key);

    info!(
        backoff_secs = backoff_seconds,
        error_count, "Retrying with Fibonacci backoff"
    );

    ctx.notify(
        &obj,
        EventType::Warning,
        reasons::RECONCILE_FAILED,
        actions::RECONCILE,
        None,
        error.to_string(),
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(std::time::Duration::from_secs(backoff_seconds))
}
