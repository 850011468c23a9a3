//! # Utilities
//!
//! Secret naming, metadata accessors and timestamp conversion.

use crate::constants::{SECRET_NAME_MAX_ATTEMPTS, SECRET_NAME_SEGMENT, SECRET_NAME_SUFFIX_LEN};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::Token;
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::HashSet;
use uuid::Uuid;

/// Construct a secret name for a Token
///
/// Format: `{token}-token-{suffix}` where the suffix is the first characters of a
/// random v4 UUID in lowercase hex.
#[must_use]
pub fn construct_secret_name(token_name: &str) -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(SECRET_NAME_SUFFIX_LEN);
    format!("{token_name}-{SECRET_NAME_SEGMENT}-{suffix}")
}

/// Construct a secret name that is not in `taken`
///
/// Gives up after a bounded number of draws and returns the last candidate;
/// a clash then surfaces as `AlreadyExists` on create.
#[must_use]
pub fn construct_unique_secret_name(token_name: &str, taken: &HashSet<&str>) -> String {
    let mut candidate = construct_secret_name(token_name);
    for _ in 1..SECRET_NAME_MAX_ATTEMPTS {
        if !taken.contains(candidate.as_str()) {
            break;
        }
        candidate = construct_secret_name(token_name);
    }
    candidate
}

/// `namespace/name` of a Token, for logs and map keys
#[must_use]
pub fn token_key(token: &Token) -> String {
    format!(
        "{}/{}",
        token.metadata.namespace.as_deref().unwrap_or("default"),
        token.metadata.name.as_deref().unwrap_or("unknown")
    )
}

pub fn require_name(token: &Token) -> Result<&str, ReconcilerError> {
    token
        .metadata
        .name
        .as_deref()
        .ok_or(ReconcilerError::MissingField("name"))
}

pub fn require_namespace(token: &Token) -> Result<&str, ReconcilerError> {
    token
        .metadata
        .namespace
        .as_deref()
        .ok_or(ReconcilerError::MissingField("namespace"))
}

pub fn require_uid(token: &Token) -> Result<&str, ReconcilerError> {
    token
        .metadata
        .uid
        .as_deref()
        .ok_or(ReconcilerError::MissingField("uid"))
}

/// Convert to the Kubernetes wire timestamp (millisecond precision)
pub fn to_k8s_time(at: DateTime<Utc>) -> Result<Time, ReconcilerError> {
    DateTime::from_timestamp_millis(at.timestamp_millis())
        .map(Time)
        .ok_or_else(|| ReconcilerError::Timestamp(format!("{at} is out of range")))
}

#[must_use]
pub fn from_k8s_time(time: &Time) -> Option<DateTime<Utc>> {
    Some(time.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_construct_secret_name_format() {
        let name = construct_secret_name("t1");
        let suffix = name
            .strip_prefix("t1-token-")
            .expect("name should start with the token name and literal segment");
        assert_eq!(suffix.len(), 5);
        assert!(
            suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
            "suffix should be lowercase hex, got {suffix}"
        );
    }

    #[test]
    fn test_unique_secret_name_avoids_taken_names() {
        let first = construct_secret_name("t1");
        let taken: HashSet<&str> = [first.as_str()].into_iter().collect();
        // With a single taken name, a clash on every draw is practically impossible
        let name = construct_unique_secret_name("t1", &taken);
        assert_ne!(name, first);
        assert!(name.starts_with("t1-token-"));
    }

    #[test]
    fn test_time_conversion_round_trips_at_millisecond_precision() {
        let at = Utc
            .timestamp_millis_opt(1_700_000_000_123)
            .single()
            .expect("valid timestamp");
        let time = to_k8s_time(at).expect("timestamp should convert");
        assert_eq!(from_k8s_time(&time), Some(at));
    }

    #[test]
    fn test_time_conversion_drops_sub_millisecond_precision() {
        let at = Utc
            .timestamp_opt(1_700_000_000, 123_456_789)
            .single()
            .expect("valid timestamp");
        let time = to_k8s_time(at).expect("timestamp should convert");
        assert_eq!(time.0.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_token_key_defaults() {
        let token = Token::new("t1", crate::crd::TokenSpec::default());
        assert_eq!(token_key(&token), "default/t1");
    }
}
