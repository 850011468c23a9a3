//! # Finalizer
//!
//! Adds and removes the Token finalizer. The finalizer keeps a Token from being
//! physically deleted until its status has been moved to `terminating`.
//!
//! Both operations are no-ops when the Token is already in the target state.
//! Otherwise they issue exactly one update and report [`StepOutcome::Mutated`].

use crate::constants::TOKEN_FINALIZER;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, StepOutcome};
use crate::controller::reconciler::utils::token_key;
use crate::crd::Token;
use tracing::info;

pub async fn add_finalizer(
    ctx: &Reconciler,
    token: &Token,
) -> Result<StepOutcome, ReconcilerError> {
    if token.has_finalizer() {
        return Ok(StepOutcome::Unchanged);
    }

    let mut updated = token.clone();
    updated
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(TOKEN_FINALIZER.to_string());
    ctx.store.update_token(&updated).await?;

    info!(
        resource.key = token_key(token).as_str(),
        finalizer = TOKEN_FINALIZER,
        "Added finalizer"
    );
    Ok(StepOutcome::Mutated)
}

pub async fn remove_finalizer(
    ctx: &Reconciler,
    token: &Token,
) -> Result<StepOutcome, ReconcilerError> {
    if !token.has_finalizer() {
        return Ok(StepOutcome::Unchanged);
    }

    let mut updated = token.clone();
    if let Some(finalizers) = updated.metadata.finalizers.as_mut() {
        finalizers.retain(|f| f != TOKEN_FINALIZER);
    }
    ctx.store.update_token(&updated).await?;

    info!(
        resource.key = token_key(token).as_str(),
        finalizer = TOKEN_FINALIZER,
        "Removed finalizer"
    );
    Ok(StepOutcome::Mutated)
}
