//! # Token Rotation Controller
//!
//! Kubernetes controller that issues service account token secrets for `Token`
//! resources and rotates them on schedule.
//!
//! ## Usage
//!
//! ```bash
//! kubectl apply -f config/crd/token.yaml
//! RUST_LOG=token_rotation_controller=debug token-rotation-controller
//! ```

use anyhow::Result;
use token_rotation_controller::runtime::initialization::initialize;
use token_rotation_controller::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(
        init.client,
        init.tokens,
        init.reconciler,
        init.server_state,
        &init.controller_config,
    )
    .await
}
