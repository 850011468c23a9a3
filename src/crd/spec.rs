//! # Token Spec
//!
//! The `Token` custom resource declares a rotating service account token secret.

use crate::constants::{DEFAULT_SERVICE_ACCOUNT_NAME, TOKEN_FINALIZER};
use crate::crd::status::{Phase, TokenStatus};
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Token Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: serviceaccount.kubetrail.io/v1beta1
/// kind: Token
/// metadata:
///   name: ci-deployer
///   namespace: default
/// spec:
///   serviceAccountName: deployer
///   rotationPeriodSeconds: 86400
///   deletionGracePeriodSeconds: 3600
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Token",
    group = "serviceaccount.kubetrail.io",
    version = "v1beta1",
    namespaced,
    status = "TokenStatus",
    shortname = "tok",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TokenSpec {
    /// Service account the issued secrets are bound to
    /// Filled with "default" by the mutating webhook when empty
    #[serde(default)]
    pub service_account_name: String,
    /// Seconds after which a replacement secret is issued
    /// Secrets are never rotated when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_period_seconds: Option<i64>,
    /// Seconds a rotated-out secret survives before it is deleted
    /// Rotated-out secrets are deleted immediately when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_grace_period_seconds: Option<i64>,
}

impl TokenSpec {
    /// Service account name with the empty string mapped to "default"
    #[must_use]
    pub fn effective_service_account_name(&self) -> &str {
        if self.service_account_name.is_empty() {
            DEFAULT_SERVICE_ACCOUNT_NAME
        } else {
            &self.service_account_name
        }
    }

    /// Rotation period, ignoring non-positive and out-of-range values
    #[must_use]
    pub fn rotation_period(&self) -> Option<chrono::Duration> {
        self.rotation_period_seconds
            .filter(|secs| *secs > 0)
            .and_then(chrono::Duration::try_seconds)
    }

    /// Deletion grace period, ignoring negative and out-of-range values
    #[must_use]
    pub fn deletion_grace_period(&self) -> Option<chrono::Duration> {
        self.deletion_grace_period_seconds
            .filter(|secs| *secs >= 0)
            .and_then(chrono::Duration::try_seconds)
    }
}

impl Token {
    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|name| name == TOKEN_FINALIZER))
    }

    #[must_use]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Name of the secret currently served to consumers, if any
    #[must_use]
    pub fn active_secret_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.secret_name.as_deref())
            .filter(|name| !name.is_empty())
    }
}
