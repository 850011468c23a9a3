//! # Token Status
//!
//! Status types written exclusively by the controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a Token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Finalizer is in place, no secret issued yet
    Pending,
    /// A valid secret is named in `status.secretName`
    Ready,
    /// Deletion was requested and cleanup is running
    Terminating,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Ready => "ready",
            Phase::Terminating => "terminating",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Mirrors the message of the latest transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Mirrors the reason of the latest transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Secret currently issued for this Token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

impl TokenStatus {
    #[must_use]
    pub fn has_condition_with_reason(&self, reason: &str) -> bool {
        self.conditions
            .iter()
            .any(|c| c.reason.as_deref() == Some(reason))
    }

    /// Refresh the condition matching `type` and `reason`, or append a new one
    pub fn upsert_condition(&mut self, condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type && c.reason == condition.reason)
        {
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// A `True` condition stamped at `at`
    #[must_use]
    pub fn satisfied(r#type: &str, reason: &str, message: &str, at: DateTime<Utc>) -> Self {
        Self {
            r#type: r#type.to_string(),
            status: "True".to_string(),
            last_transition_time: Some(at.to_rfc3339()),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }

    #[must_use]
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}
