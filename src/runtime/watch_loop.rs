//! # Watch Loop
//!
//! Controller watch loop that monitors Token resources, and the secrets they
//! own, and triggers reconciliation when changes are detected.

use crate::config::ControllerConfig;
use crate::constants::SERVICE_ACCOUNT_TOKEN_SECRET_TYPE;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::Token;
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{api::Api, Client};
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller until a shutdown signal arrives
///
/// Secret changes are mapped back to the owning Token through owner
/// references, so a deleted or edited secret is repaired without waiting for
/// the steady-state requeue.
pub async fn run_watch_loop(
    client: Client,
    tokens: Api<Token>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: &ControllerConfig,
) -> Result<(), anyhow::Error> {
    let secrets: Api<Secret> = match config.watch_namespace.as_deref() {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };
    let secret_selector = format!("type={SERVICE_ACCOUNT_TOKEN_SECRET_TYPE}");

    // Flip readiness first so traffic drains while in-flight reconciles finish
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown_server_state.set_ready(false);
        }
    });

    let watch_span = tracing::span!(
        tracing::Level::INFO,
        "token.watch",
        concurrency = config.max_concurrent_reconciliations
    );

    info!("Starting controller watch loop...");
    Controller::new(tokens, watcher::Config::default().any_semantic())
        .owns(secrets, watcher::Config::default().fields(&secret_selector))
        .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations))
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    debug!(resource = %object, ?action, "watch.event.reconciled");
                }
                Err(controller::Error::ReconcilerFailed(e, object)) => {
                    debug!(resource = %object, error = %e, "watch.event.reconciliation_failed");
                }
                Err(e) => {
                    warn!(error = %e, "Controller stream error");
                }
            }
        })
        .instrument(watch_span)
        .await;

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}
