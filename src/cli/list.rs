//! # List Command
//!
//! Command to list Token resources.

use anyhow::{Context, Result};
use kube::{api::Api, Client};
use token_rotation_controller::crd::Token;

/// List Token resources in one or all namespaces
pub async fn list_command(client: Client, namespace: Option<String>) -> Result<()> {
    let api: Api<Token> = if let Some(ns) = &namespace {
        println!("Listing Token resources in namespace '{ns}'...");
        Api::namespaced(client, ns)
    } else {
        println!("Listing Token resources in all namespaces...");
        Api::all(client)
    };

    let tokens = api
        .list(&kube::api::ListParams::default())
        .await
        .context("Failed to list Token resources")?;

    if tokens.items.is_empty() {
        println!("No Token resources found.");
        return Ok(());
    }

    println!(
        "\n{:<30} {:<20} {:<12} {:<40} {:<10}",
        "NAME", "NAMESPACE", "PHASE", "SECRET", "ROTATION"
    );
    println!("{}", "-".repeat(116));

    for token in tokens.items {
        let name = token.metadata.name.as_deref().unwrap_or("<unknown>");
        let ns = token.metadata.namespace.as_deref().unwrap_or("<unknown>");
        let phase = token.phase().map_or("-", |phase| phase.as_str());
        let secret = token.active_secret_name().unwrap_or("-");
        let rotation = format_period(token.spec.rotation_period_seconds);

        println!("{name:<30} {ns:<20} {phase:<12} {secret:<40} {rotation:<10}");
    }

    Ok(())
}

/// Render a period in seconds the way `kubectl` renders ages
pub(crate) fn format_period(seconds: Option<i64>) -> String {
    match seconds {
        Some(secs) if secs > 0 && secs % 86_400 == 0 => format!("{}d", secs / 86_400),
        Some(secs) if secs > 0 && secs % 3_600 == 0 => format!("{}h", secs / 3_600),
        Some(secs) if secs > 0 && secs % 60 == 0 => format!("{}m", secs / 60),
        Some(secs) if secs > 0 => format!("{secs}s"),
        _ => "never".to_string(),
    }
}
