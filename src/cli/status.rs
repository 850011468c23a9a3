//! # Status Command
//!
//! Command to show detailed status of a Token resource.

use crate::list::format_period;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{api::Api, Client};
use token_rotation_controller::controller::reconciler::rotation::{
    is_owned_by, rotation_due, secret_created_at,
};
use token_rotation_controller::crd::Token;

/// Show spec, status, conditions and owned secrets of a Token
pub async fn status_command(client: Client, name: String, namespace: Option<String>) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or("default");

    println!("Status for Token '{ns}/{name}'");
    println!();

    let tokens: Api<Token> = Api::namespaced(client.clone(), ns);
    let token = tokens
        .get(&name)
        .await
        .with_context(|| format!("Failed to get Token '{ns}/{name}'"))?;

    println!("Resource Information:");
    println!("  Name: {name}");
    println!("  Namespace: {ns}");
    if let Some(uid) = &token.metadata.uid {
        println!("  UID: {uid}");
    }
    if token.is_marked_for_deletion() {
        println!("  Marked for deletion: yes");
    }

    println!();
    println!("Spec:");
    println!(
        "  Service Account: {}",
        token.spec.effective_service_account_name()
    );
    println!(
        "  Rotation Period: {}",
        format_period(token.spec.rotation_period_seconds)
    );
    println!(
        "  Deletion Grace Period: {}",
        format_period(token.spec.deletion_grace_period_seconds)
    );

    if let Some(status) = &token.status {
        println!();
        println!("Status:");
        if let Some(phase) = status.phase {
            println!("  Phase: {}", phase.as_str());
        }
        if let Some(reason) = &status.reason {
            println!("  Reason: {reason}");
        }
        if let Some(message) = &status.message {
            println!("  Message: {message}");
        }
        if let Some(secret_name) = &status.secret_name {
            println!("  Secret: {secret_name}");
        }

        if !status.conditions.is_empty() {
            println!();
            println!("Conditions:");
            for condition in &status.conditions {
                println!("  {}: {}", condition.r#type, condition.status);
                if let Some(reason) = &condition.reason {
                    println!("    Reason: {reason}");
                }
                if let Some(message) = &condition.message {
                    println!("    Message: {message}");
                }
                if let Some(last_transition_time) = &condition.last_transition_time {
                    println!("    Last Transition: {last_transition_time}");
                }
            }
        }
    } else {
        println!();
        println!("Status: No status available (resource may not have been reconciled yet)");
    }

    let Some(uid) = token.metadata.uid.as_deref() else {
        return Ok(());
    };
    let secrets: Api<Secret> = Api::namespaced(client, ns);
    let owned: Vec<Secret> = secrets
        .list(&kube::api::ListParams::default())
        .await
        .with_context(|| format!("Failed to list secrets in namespace '{ns}'"))?
        .items
        .into_iter()
        .filter(|secret| is_owned_by(secret, uid))
        .collect();

    println!();
    if owned.is_empty() {
        println!("Owned Secrets: none");
        return Ok(());
    }

    let now = chrono::Utc::now();
    let active = token.active_secret_name();
    println!("Owned Secrets:");
    for secret in &owned {
        let secret_name = secret.metadata.name.as_deref().unwrap_or("<unknown>");
        let created = secret_created_at(secret)
            .map_or_else(|| "-".to_string(), |at| at.to_rfc3339());
        let state = if active == Some(secret_name) {
            if rotation_due(secret, &token.spec, now) {
                "active, rotation due"
            } else {
                "active"
            }
        } else {
            "rotated out"
        };
        println!("  {secret_name} (created {created}, {state})");
    }

    Ok(())
}
