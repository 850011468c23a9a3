//! # tokenctl
//!
//! Command-line interface for inspecting Tokens managed by the Token Rotation Controller.
//!
//! ## Usage
//!
//! ```bash
//! # List Tokens in all namespaces
//! tokenctl list
//!
//! # List Tokens in one namespace
//! tokenctl list -n ci
//!
//! # Show spec, status, conditions and owned secrets of a Token
//! tokenctl status ci-deployer -n ci
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::Client;

mod list;
mod status;

/// Token Rotation Controller CLI
#[derive(Parser)]
#[command(name = "tokenctl")]
#[command(
    about = "Inspect Tokens managed by the Token Rotation Controller",
    long_about = None,
    after_help = "\
Examples:
  tokenctl list
  tokenctl list --namespace ci
  tokenctl status ci-deployer --namespace ci
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (all namespaces for `list`, `default` for `status` when omitted)
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List Token resources
    List,
    /// Show detailed status of a Token resource
    Status {
        /// Name of the Token resource
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must happen before the client opens a TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokenctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::List => list::list_command(client, cli.namespace).await,
        Commands::Status { name } => status::status_command(client, name, cli.namespace).await,
    }
}
