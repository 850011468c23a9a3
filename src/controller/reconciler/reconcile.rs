//! # Reconcile
//!
//! Entry points that sequence the finalizer, status and rotation steps for one Token.
//!
//! ```text
//! fetch ── absent ──────────────────────────────► done
//!   │
//!   ├─ marked for deletion ─► finalize_status ─► finalize_resources ─► remove_finalizer
//!   │
//!   └─ active ──────────────► add_finalizer ───► initialize_status ──► reconcile_secrets
//! ```
//!
//! The first step that mutates the store ends the pass. A pass that mutates nothing
//! requeues after the steady-state interval so rotation deadlines are noticed
//! without any external change.

use crate::controller::reconciler::finalizer::{add_finalizer, remove_finalizer};
use crate::controller::reconciler::rotation::reconcile_secrets;
use crate::controller::reconciler::status::{finalize_status, initialize_status};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, StepOutcome};
use crate::crd::Token;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, Instrument};

/// Run one pass for the Token at `namespace/name`
///
/// Returns the delay before the next pass, or `None` when the pass ended on a
/// mutation or the Token no longer exists.
pub async fn reconcile_token(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<Option<Duration>, ReconcilerError> {
    let Some(token) = ctx.store.get_token(namespace, name).await? else {
        debug!(
            resource.name = name,
            resource.namespace = namespace,
            "Token not found, nothing to reconcile"
        );
        return Ok(None);
    };

    let outcome = if token.is_marked_for_deletion() {
        reconcile_deleting(ctx, &token).await?
    } else {
        reconcile_active(ctx, &token).await?
    };

    match outcome {
        StepOutcome::Mutated => Ok(None),
        StepOutcome::Unchanged => Ok(Some(ctx.config.reconcile_requeue_duration())),
    }
}

async fn reconcile_active(ctx: &Reconciler, token: &Token) -> Result<StepOutcome, ReconcilerError> {
    if add_finalizer(ctx, token).await?.is_mutated() {
        return Ok(StepOutcome::Mutated);
    }
    if initialize_status(ctx, token).await?.is_mutated() {
        return Ok(StepOutcome::Mutated);
    }
    reconcile_secrets(ctx, token).await
}

async fn reconcile_deleting(
    ctx: &Reconciler,
    token: &Token,
) -> Result<StepOutcome, ReconcilerError> {
    if finalize_status(ctx, token).await?.is_mutated() {
        return Ok(StepOutcome::Mutated);
    }
    if finalize_resources(ctx, token).await?.is_mutated() {
        return Ok(StepOutcome::Mutated);
    }
    remove_finalizer(ctx, token).await
}

/// Cleanup of resources owned by a deleted Token
///
/// Issued secrets outlive their Token and are reaped by the garbage collector
/// through their owner reference, so there is nothing to do here yet.
#[allow(
    clippy::unused_async,
    reason = "Keeps the same shape as the other steps so cleanup can be added in place"
)]
async fn finalize_resources(
    _ctx: &Reconciler,
    _token: &Token,
) -> Result<StepOutcome, ReconcilerError> {
    Ok(StepOutcome::Unchanged)
}

/// `kube_runtime::Controller` reconcile callback
pub async fn reconcile(token: Arc<Token>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let name = token.name_any();
    let namespace = token
        .namespace()
        .ok_or(ReconcilerError::MissingField("namespace"))?;
    let resource_key = format!("{namespace}/{name}");

    let span = tracing::info_span!(
        "token.reconcile",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        resource.version = token.resource_version().unwrap_or_default().as_str(),
    );

    async move {
        observability::metrics::increment_reconciliations();
        let start = Instant::now();
        let result = reconcile_token(&ctx, &namespace, &name).await;
        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let requeue = result?;
        if ctx.reset_backoff(&resource_key) {
            info!("Reconciliation recovered, backoff reset");
        }
        Ok::<Action, ReconcilerError>(match requeue {
            Some(delay) => {
                observability::metrics::increment_requeues_total("steady-state");
                debug!(requeue_secs = delay.as_secs(), "Pass converged");
                Action::requeue(delay)
            }
            None => {
                debug!("Pass ended on a write, awaiting the resulting event");
                Action::await_change()
            }
        })
    }
    .instrument(span)
    .await
}
