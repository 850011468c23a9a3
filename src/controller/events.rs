//! # Events
//!
//! Kubernetes Events emitted on Tokens, visible via `kubectl describe token`.
//!
//! Publishing is fire-and-forget: failures are logged and never reach the
//! reconciliation result. Callers route events through the [`RateLimiter`]
//! so a Token failing on every retry does not flood the event stream.
//!
//! [`RateLimiter`]: crate::controller::limiter::RateLimiter

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publisher backed by `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventPublisher").finish_non_exhaustive()
    }
}

impl KubeEventPublisher {
    /// `controller_name` is reported as the event's reporting component
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                resource.name = resource_ref.name.as_deref().unwrap_or("unknown"),
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Publisher that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons, shown in the REASON column of `kubectl get events`
pub mod reasons {
    /// A new token secret was issued
    pub const SECRET_CREATED: &str = "SecretCreated";
    /// A rotated-out token secret was deleted
    pub const SECRET_DELETED: &str = "SecretDeleted";
    /// A reconciliation pass returned an error
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
}

/// Event actions
pub mod actions {
    pub const ISSUE: &str = "Issue";
    pub const ROTATE: &str = "Rotate";
    pub const EXPIRE: &str = "Expire";
    pub const RECONCILE: &str = "Reconcile";
}
