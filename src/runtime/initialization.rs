//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, ServerConfig};
use crate::constants::CONTROLLER_NAME;
use crate::controller::events::KubeEventPublisher;
use crate::controller::reconciler::{KubeStore, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::Token;
use crate::observability;
use crate::webhook::start_webhook_server;
use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything the watch loop needs, produced by [`initialize`]
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for Token resources, scoped to the watched namespace
    pub tokens: Api<Token>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
    pub server_config: ServerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
/// - Webhook server startup, when TLS material is mounted
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any TLS connection is made
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_rotation_controller=info".into()),
        )
        .init();

    if !provider_installed {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting Token Rotation Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let controller_config = ControllerConfig::from_env();
    let server_config = ServerConfig::from_env();
    info!(?controller_config, "Loaded controller configuration");

    let server_state = Arc::new(ServerState::new());

    // Start HTTP server for metrics and probes, then wait for it to bind
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let tokens: Api<Token> = match controller_config.watch_namespace.as_deref() {
        Some(namespace) => {
            info!(namespace, "Watching Tokens in a single namespace");
            Api::namespaced(client.clone(), namespace)
        }
        None => {
            info!("Watching Tokens in all namespaces");
            Api::all(client.clone())
        }
    };

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeStore::new(client.clone())),
        Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME)),
        controller_config.clone(),
    ));

    spawn_limiter_pruning(&reconciler);

    if server_config.webhook_tls_available() {
        let webhook_config = server_config.clone();
        tokio::spawn(async move {
            if let Err(e) = start_webhook_server(&webhook_config).await {
                error!("Webhook server error: {:#}", e);
            }
        });
    } else {
        info!(
            cert = %server_config.webhook_cert_path.display(),
            "Webhook TLS material not found, admission webhooks disabled"
        );
    }

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        tokens,
        reconciler,
        server_state,
        controller_config,
        server_config,
    })
}

/// Periodically forget debounce entries of Tokens that went quiet
fn spawn_limiter_pruning(reconciler: &Arc<Reconciler>) {
    let limiter = Arc::clone(&reconciler.limiter);
    let every = reconciler
        .config
        .event_debounce_duration()
        .max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            limiter.prune_older_than(every);
        }
    });
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
