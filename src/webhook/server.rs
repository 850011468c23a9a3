//! Admission webhook server.
//!
//! Serves the mutating and validating endpoints registered for Tokens.
//! TLS material is mounted at `/etc/webhook/certs/` by default; the server only
//! starts when both files are present.

use super::{default_spec, validate_spec};
use crate::config::ServerConfig;
use crate::crd::Token;
use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use serde_json::json;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub const MUTATE_PATH: &str = "/mutate-serviceaccount-kubetrail-io-v1beta1-token";
pub const VALIDATE_PATH: &str = "/validate-serviceaccount-kubetrail-io-v1beta1-token";

pub fn webhook_router() -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate_handler))
        .route(VALIDATE_PATH, post(validate_handler))
        .layer(TraceLayer::new_for_http())
}

/// Apply defaulting and answer with a JSON patch when anything changed
#[must_use]
pub fn mutate(request: &AdmissionRequest<Token>) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    let Some(token) = request.object.as_ref() else {
        return response;
    };

    let mut spec = token.spec.clone();
    if !default_spec(&mut spec) {
        return response;
    }

    debug!(
        uid = %request.uid,
        name = ?request.name,
        service_account = spec.service_account_name.as_str(),
        "Defaulting service account name"
    );
    let patch = json!([{
        "op": "add",
        "path": "/spec/serviceAccountName",
        "value": spec.service_account_name,
    }]);
    let patch = match serde_json::from_value::<json_patch::Patch>(patch) {
        Ok(patch) => patch,
        Err(e) => return AdmissionResponse::invalid(format!("Failed to build patch: {e}")),
    };
    match response.with_patch(patch) {
        Ok(response) => response,
        Err(e) => AdmissionResponse::invalid(format!("Failed to serialize patch: {e}")),
    }
}

/// Allow deletes unconditionally; otherwise enforce the period floors
#[must_use]
pub fn validate(request: &AdmissionRequest<Token>) -> AdmissionResponse {
    if request.operation == Operation::Delete {
        return AdmissionResponse::from(request);
    }

    let Some(token) = request.object.as_ref() else {
        return AdmissionResponse::from(request).deny("Missing object in request");
    };

    match validate_spec(&token.spec) {
        Ok(()) => AdmissionResponse::from(request),
        Err(e) => {
            warn!(uid = %request.uid, name = ?request.name, error = %e, "Admission request denied");
            AdmissionResponse::from(request).deny(e.to_string())
        }
    }
}

async fn mutate_handler(Json(review): Json<AdmissionReview<Token>>) -> impl IntoResponse {
    respond(review, mutate)
}

async fn validate_handler(Json(review): Json<AdmissionReview<Token>>) -> impl IntoResponse {
    respond(review, validate)
}

fn respond(
    review: AdmissionReview<Token>,
    decide: fn(&AdmissionRequest<Token>) -> AdmissionResponse,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    let request: AdmissionRequest<Token> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(AdmissionResponse::invalid(format!("Invalid AdmissionReview: {e}")).into_review()),
            );
        }
    };

    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );
    (StatusCode::OK, Json(decide(&request).into_review()))
}

/// Serve the webhook endpoints over TLS until the process exits
///
/// # Errors
///
/// Fails when the certificate or key cannot be loaded, or the listener fails.
pub async fn start_webhook_server(config: &ServerConfig) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let tls = RustlsConfig::from_pem_file(&config.webhook_cert_path, &config.webhook_key_path)
        .await
        .with_context(|| {
            format!(
                "Failed to load webhook TLS material from {} and {}",
                config.webhook_cert_path.display(),
                config.webhook_key_path.display()
            )
        })?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));
    info!(port = config.webhook_port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, tls)
        .serve(webhook_router().into_make_service())
        .await
        .context("Webhook server failed")?;

    Ok(())
}
