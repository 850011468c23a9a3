//! # Admission Webhook
//!
//! Defaulting and validation applied to Tokens before they are stored.
//!
//! - Defaulting fills an empty `serviceAccountName` with `default`
//! - Validation rejects rotation or grace periods below [`MIN_PERIOD_SECONDS`]
//!
//! The policies are plain functions over [`TokenSpec`]; `server` wraps them in
//! `AdmissionReview` handlers.

mod server;

pub use server::{mutate, start_webhook_server, validate, webhook_router, MUTATE_PATH, VALIDATE_PATH};

use crate::constants::{DEFAULT_SERVICE_ACCOUNT_NAME, MIN_PERIOD_SECONDS};
use crate::crd::TokenSpec;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rotation period seconds needs to be at least {min} seconds")]
    RotationPeriodTooShort { value: i64, min: i64 },
    #[error("token deletion grace period needs to be at least {min} seconds")]
    DeletionGracePeriodTooShort { value: i64, min: i64 },
}

/// Fill unset defaults in place; returns whether anything changed
pub fn default_spec(spec: &mut TokenSpec) -> bool {
    if spec.service_account_name.is_empty() {
        spec.service_account_name = DEFAULT_SERVICE_ACCOUNT_NAME.to_string();
        return true;
    }
    false
}

/// Check a spec on create or update
///
/// # Errors
///
/// Returns the first period that is set and below the floor.
pub fn validate_spec(spec: &TokenSpec) -> Result<(), ValidationError> {
    if let Some(value) = spec.rotation_period_seconds {
        if value < MIN_PERIOD_SECONDS {
            return Err(ValidationError::RotationPeriodTooShort {
                value,
                min: MIN_PERIOD_SECONDS,
            });
        }
    }
    if let Some(value) = spec.deletion_grace_period_seconds {
        if value < MIN_PERIOD_SECONDS {
            return Err(ValidationError::DeletionGracePeriodTooShort {
                value,
                min: MIN_PERIOD_SECONDS,
            });
        }
    }
    Ok(())
}
