//! # Status
//!
//! Phase transitions owned by the controller: `pending` once the finalizer is in
//! place, `terminating` once deletion is requested. The `ready` transition is made
//! by the rotation engine when it issues a secret.

use crate::constants::{
    CONDITION_TYPE_OBJECT, MESSAGE_MARKED_FOR_DELETION, MESSAGE_OBJECT_INITIALIZED,
    REASON_FINALIZER_ADDED, REASON_OBJECT_INITIALIZED, REASON_OBJECT_MARKED_FOR_DELETION,
    TOKEN_FINALIZER,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, StepOutcome};
use crate::controller::reconciler::utils::token_key;
use crate::crd::{Condition, Phase, Token, TokenStatus};
use tracing::{debug, info};

/// Move a freshly finalized Token to `pending`
///
/// Runs once per Token: the `FinalizerAdded` condition it writes is the guard
/// against re-initialization.
pub async fn initialize_status(
    ctx: &Reconciler,
    token: &Token,
) -> Result<StepOutcome, ReconcilerError> {
    if !token.has_finalizer() {
        return Err(ReconcilerError::FinalizerNotFound {
            finalizer: TOKEN_FINALIZER,
            key: token_key(token),
        });
    }

    let previous = token.status.clone().unwrap_or_default();
    if previous.has_condition_with_reason(REASON_FINALIZER_ADDED) {
        return Ok(StepOutcome::Unchanged);
    }

    let status = TokenStatus {
        phase: Some(Phase::Pending),
        conditions: vec![Condition::satisfied(
            CONDITION_TYPE_OBJECT,
            REASON_FINALIZER_ADDED,
            MESSAGE_OBJECT_INITIALIZED,
            ctx.clock.now(),
        )],
        message: Some(MESSAGE_OBJECT_INITIALIZED.to_string()),
        reason: Some(REASON_OBJECT_INITIALIZED.to_string()),
        secret_name: previous.secret_name,
    };
    write_status(ctx, token, status).await?;

    info!(resource.key = token_key(token).as_str(), "Initialized status");
    Ok(StepOutcome::Mutated)
}

/// Move a Token that is marked for deletion to `terminating`
///
/// Conditions are kept. Without the finalizer there is nothing left to guard and
/// the step does nothing.
pub async fn finalize_status(
    ctx: &Reconciler,
    token: &Token,
) -> Result<StepOutcome, ReconcilerError> {
    if !token.has_finalizer() {
        debug!(
            resource.key = token_key(token).as_str(),
            "Finalizer already removed, skipping status finalization"
        );
        return Ok(StepOutcome::Unchanged);
    }
    if token.phase() == Some(Phase::Terminating) {
        return Ok(StepOutcome::Unchanged);
    }

    let previous = token.status.clone().unwrap_or_default();
    let status = TokenStatus {
        phase: Some(Phase::Terminating),
        message: Some(MESSAGE_MARKED_FOR_DELETION.to_string()),
        reason: Some(REASON_OBJECT_MARKED_FOR_DELETION.to_string()),
        ..previous
    };
    write_status(ctx, token, status).await?;

    info!(resource.key = token_key(token).as_str(), "Marked status terminating");
    Ok(StepOutcome::Mutated)
}

/// Persist `status` through a single status update
pub(crate) async fn write_status(
    ctx: &Reconciler,
    token: &Token,
    status: TokenStatus,
) -> Result<(), ReconcilerError> {
    let mut updated = token.clone();
    updated.status = Some(status);
    ctx.store.update_token_status(&updated).await?;
    Ok(())
}
