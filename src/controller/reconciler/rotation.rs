//! # Rotation
//!
//! Issues, rotates and expires the secrets owned by a Token.
//!
//! One pass runs three stages in order:
//!
//! 1. **Expire**: delete owned secrets older than rotation period plus grace period
//!    when both periods are configured. Without a grace period, owned secrets other
//!    than the one named in `status.secretName` are strays left by an interrupted
//!    pass and are deleted as well.
//! 2. **Ensure**: issue a secret when the one named in `status.secretName` is gone,
//!    or issue a replacement once it is older than the rotation period. Without a
//!    grace period the replaced secret is deleted in the same pass.
//! 3. **Record**: when a secret was issued, move the Token to `ready` and point
//!    `status.secretName` at it with a single status update.

use crate::constants::{
    CONDITION_TYPE_CREDENTIAL, MESSAGE_CREATED_TOKEN, REASON_CREATED_TOKEN,
    SERVICE_ACCOUNT_NAME_ANNOTATION, SERVICE_ACCOUNT_TOKEN_SECRET_TYPE, TOKEN_FINALIZER,
};
use crate::controller::events::{actions, reasons};
use crate::controller::reconciler::status::write_status;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, StepOutcome};
use crate::controller::reconciler::utils::{
    construct_unique_secret_name, from_k8s_time, require_name, require_namespace, require_uid,
    to_k8s_time, token_key,
};
use crate::crd::{Condition, Phase, Token, TokenSpec, TokenStatus};
use crate::observability;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::runtime::events::EventType;
use kube::Resource;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Run the full rotation pass for a Token that carries the finalizer
pub async fn reconcile_secrets(
    ctx: &Reconciler,
    token: &Token,
) -> Result<StepOutcome, ReconcilerError> {
    if !token.has_finalizer() {
        return Err(ReconcilerError::FinalizerNotFound {
            finalizer: TOKEN_FINALIZER,
            key: token_key(token),
        });
    }

    let namespace = require_namespace(token)?;
    let uid = require_uid(token)?;
    let now = ctx.clock.now();

    let secrets = ctx.store.list_secrets(namespace).await?;
    expire_secrets(ctx, token, namespace, &secrets, uid, now).await?;

    match ensure_active_secret(ctx, token, &secrets, now).await? {
        Some(secret_name) => {
            record_issued_secret(ctx, token, secret_name, now).await?;
            Ok(StepOutcome::Mutated)
        }
        None => Ok(StepOutcome::Unchanged),
    }
}

/// Delete owned secrets whose grace period has elapsed, and strays
///
/// A failed delete aborts the pass; the next pass retries it.
async fn expire_secrets(
    ctx: &Reconciler,
    token: &Token,
    namespace: &str,
    secrets: &[Secret],
    uid: &str,
    now: DateTime<Utc>,
) -> Result<(), ReconcilerError> {
    let active = token.active_secret_name();
    for secret in secrets.iter().filter(|s| is_owned_by(s, uid)) {
        let Some(name) = secret.metadata.name.as_deref() else {
            continue;
        };
        let stray = is_stray(secret, &token.spec, active);
        if !stray && !grace_period_elapsed(secret, &token.spec, now) {
            continue;
        }

        ctx.store.delete_secret(namespace, name).await?;
        observability::metrics::increment_secrets_deleted();
        info!(
            resource.key = token_key(token).as_str(),
            secret.name = name,
            stray,
            "Deleted expired secret"
        );
        ctx.notify(
            token,
            EventType::Normal,
            reasons::SECRET_DELETED,
            actions::EXPIRE,
            Some(name),
            format!("deleted expired secret {name}"),
        );
    }
    Ok(())
}

/// Make sure a valid secret exists; returns the name of a newly issued one
async fn ensure_active_secret(
    ctx: &Reconciler,
    token: &Token,
    listed: &[Secret],
    now: DateTime<Utc>,
) -> Result<Option<String>, ReconcilerError> {
    let namespace = require_namespace(token)?;
    let current = match token.active_secret_name() {
        Some(name) => ctx.store.get_secret(namespace, name).await?,
        None => None,
    };

    let taken: HashSet<&str> = listed
        .iter()
        .filter_map(|s| s.metadata.name.as_deref())
        .collect();

    match current {
        None => {
            let name = issue_secret(ctx, token, &taken, now, actions::ISSUE).await?;
            Ok(Some(name))
        }
        Some(secret) if rotation_due(&secret, &token.spec, now) => {
            let name = issue_secret(ctx, token, &taken, now, actions::ROTATE).await?;
            if token.spec.deletion_grace_period().is_none() {
                if let Some(old) = secret.metadata.name.as_deref() {
                    ctx.store.delete_secret(namespace, old).await?;
                    observability::metrics::increment_secrets_deleted();
                    info!(
                        resource.key = token_key(token).as_str(),
                        secret.name = old,
                        "Deleted rotated secret without grace period"
                    );
                    ctx.notify(
                        token,
                        EventType::Normal,
                        reasons::SECRET_DELETED,
                        actions::ROTATE,
                        Some(old),
                        format!("deleted rotated secret {old}"),
                    );
                }
            }
            Ok(Some(name))
        }
        Some(secret) => {
            debug!(
                resource.key = token_key(token).as_str(),
                secret.name = secret.metadata.name.as_deref().unwrap_or_default(),
                "Active secret is still valid"
            );
            Ok(None)
        }
    }
}

async fn issue_secret(
    ctx: &Reconciler,
    token: &Token,
    taken: &HashSet<&str>,
    now: DateTime<Utc>,
    action: &'static str,
) -> Result<String, ReconcilerError> {
    let name = construct_unique_secret_name(require_name(token)?, taken);
    let secret = build_secret(token, &name, now)?;
    ctx.store.create_secret(&secret).await?;

    observability::metrics::increment_secrets_created();
    info!(
        resource.key = token_key(token).as_str(),
        secret.name = name.as_str(),
        action,
        "Created token secret"
    );
    ctx.notify(
        token,
        EventType::Normal,
        reasons::SECRET_CREATED,
        action,
        Some(name.as_str()),
        format!("created secret {name}"),
    );
    Ok(name)
}

async fn record_issued_secret(
    ctx: &Reconciler,
    token: &Token,
    secret_name: String,
    now: DateTime<Utc>,
) -> Result<(), ReconcilerError> {
    let mut status = token.status.clone().unwrap_or_default();
    status.upsert_condition(Condition::satisfied(
        CONDITION_TYPE_CREDENTIAL,
        REASON_CREATED_TOKEN,
        MESSAGE_CREATED_TOKEN,
        now,
    ));
    let status = TokenStatus {
        phase: Some(Phase::Ready),
        message: Some(MESSAGE_CREATED_TOKEN.to_string()),
        reason: Some(REASON_CREATED_TOKEN.to_string()),
        secret_name: Some(secret_name),
        ..status
    };
    write_status(ctx, token, status).await
}

/// Build the secret issued for `token`
///
/// The deletion timestamp records the rotation deadline; the API server treats it
/// as read-only and the controller never relies on it.
pub fn build_secret(
    token: &Token,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Secret, ReconcilerError> {
    let spec = &token.spec;
    let owner = OwnerReference {
        api_version: Token::api_version(&()).to_string(),
        kind: Token::kind(&()).to_string(),
        name: require_name(token)?.to_string(),
        uid: require_uid(token)?.to_string(),
        ..OwnerReference::default()
    };
    let deletion_timestamp = spec
        .rotation_period()
        .map(|period| {
            now.checked_add_signed(period)
                .ok_or_else(|| ReconcilerError::Timestamp("rotation deadline overflows".to_string()))
                .and_then(to_k8s_time)
        })
        .transpose()?;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(require_namespace(token)?.to_string()),
            creation_timestamp: Some(to_k8s_time(now)?),
            deletion_timestamp,
            deletion_grace_period_seconds: spec.deletion_grace_period_seconds,
            annotations: Some(BTreeMap::from([(
                SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
                spec.effective_service_account_name().to_string(),
            )])),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        type_: Some(SERVICE_ACCOUNT_TOKEN_SECRET_TYPE.to_string()),
        ..Secret::default()
    })
}

/// Whether `secret` carries an owner reference to the Token with `uid`
#[must_use]
pub fn is_owned_by(secret: &Secret, uid: &str) -> bool {
    secret
        .metadata
        .owner_references
        .iter()
        .flatten()
        .any(|owner| owner.uid == uid)
}

#[must_use]
pub fn secret_created_at(secret: &Secret) -> Option<DateTime<Utc>> {
    secret
        .metadata
        .creation_timestamp
        .as_ref()
        .and_then(from_k8s_time)
}

/// A secret is due for rotation once it is at least one rotation period old
///
/// Never due when no rotation period is configured or the age is unknown.
#[must_use]
pub fn rotation_due(secret: &Secret, spec: &TokenSpec, now: DateTime<Utc>) -> bool {
    match (spec.rotation_period(), secret_created_at(secret)) {
        (Some(period), Some(created)) => created
            .checked_add_signed(period)
            .is_some_and(|deadline| now >= deadline),
        _ => false,
    }
}

/// An owned secret that is not the active one while no grace period is set
///
/// Rotation without a grace period leaves no room for coexistence, so such a
/// secret can only come from a pass that issued it and then failed to record it.
#[must_use]
pub fn is_stray(secret: &Secret, spec: &TokenSpec, active: Option<&str>) -> bool {
    spec.deletion_grace_period().is_none() && secret.metadata.name.as_deref() != active
}

/// A secret is expired once rotation period plus grace period have passed
///
/// Only applies when both periods are configured.
#[must_use]
pub fn grace_period_elapsed(secret: &Secret, spec: &TokenSpec, now: DateTime<Utc>) -> bool {
    match (
        spec.rotation_period(),
        spec.deletion_grace_period(),
        secret_created_at(secret),
    ) {
        (Some(rotation), Some(grace), Some(created)) => created
            .checked_add_signed(rotation)
            .and_then(|deadline| deadline.checked_add_signed(grace))
            .is_some_and(|expiry| now >= expiry),
        _ => false,
    }
}
