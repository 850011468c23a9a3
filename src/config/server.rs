//! # Server Configuration
//!
//! Settings for the metrics/probe server and the admission webhook server.

use super::{env_var_or_default, env_var_or_default_str};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to report ready (seconds)
    pub startup_timeout_secs: u64,
    /// Poll interval while waiting for the HTTP server (milliseconds)
    pub poll_interval_ms: u64,
    /// HTTPS port for admission webhooks
    pub webhook_port: u16,
    /// PEM certificate served by the webhook
    pub webhook_cert_path: PathBuf,
    /// PEM private key served by the webhook
    pub webhook_key_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            webhook_port: DEFAULT_WEBHOOK_PORT,
            webhook_cert_path: PathBuf::from(DEFAULT_WEBHOOK_CERT_PATH),
            webhook_key_path: PathBuf::from(DEFAULT_WEBHOOK_KEY_PATH),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
            webhook_port: env_var_or_default("WEBHOOK_PORT", DEFAULT_WEBHOOK_PORT),
            webhook_cert_path: PathBuf::from(env_var_or_default_str(
                "WEBHOOK_CERT_PATH",
                DEFAULT_WEBHOOK_CERT_PATH,
            )),
            webhook_key_path: PathBuf::from(env_var_or_default_str(
                "WEBHOOK_KEY_PATH",
                DEFAULT_WEBHOOK_KEY_PATH,
            )),
        }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The webhook is served only when both TLS files are mounted
    pub fn webhook_tls_available(&self) -> bool {
        is_file(&self.webhook_cert_path) && is_file(&self.webhook_key_path)
    }
}

fn is_file(path: &Path) -> bool {
    path.is_file()
}
