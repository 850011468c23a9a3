//! # Token Store
//!
//! The reconciler's only view of the cluster. Every read and write of Tokens
//! and their secrets goes through [`TokenStore`], so the state machine can be
//! exercised against an in-memory store in tests.
//!
//! Writes are optimistic: a Token carries the `resourceVersion` it was read at,
//! and the store rejects the write with [`StoreError::Conflict`] if the stored
//! object moved on since.

use crate::crd::Token;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("{kind} {key} was modified since it was read")]
    Conflict { kind: &'static str, key: String },
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: String },
    #[error("{kind} is missing metadata.{field}")]
    MissingMetadata {
        kind: &'static str,
        field: &'static str,
    },
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Map a Kubernetes API error onto the store taxonomy
    fn from_kube(err: kube::Error, kind: &'static str, key: String) -> Self {
        match &err {
            kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
                StoreError::AlreadyExists { kind, key }
            }
            kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict { kind, key },
            _ => StoreError::Kube(err),
        }
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch a Token; `None` when it does not exist
    async fn get_token(&self, namespace: &str, name: &str) -> Result<Option<Token>, StoreError>;

    /// Replace the Token's metadata and spec, guarded by its `resourceVersion`
    async fn update_token(&self, token: &Token) -> Result<Token, StoreError>;

    /// Write the Token's status subresource, guarded by its `resourceVersion`
    async fn update_token_status(&self, token: &Token) -> Result<Token, StoreError>;

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, StoreError>;

    /// Fetch a secret; `None` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Delete a secret; deleting an absent secret succeeds
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// [`TokenStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn tokens(&self, namespace: &str) -> Api<Token> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn token_identity(token: &Token) -> Result<(&str, &str), StoreError> {
    let namespace = token
        .metadata
        .namespace
        .as_deref()
        .ok_or(StoreError::MissingMetadata {
            kind: "Token",
            field: "namespace",
        })?;
    let name = token
        .metadata
        .name
        .as_deref()
        .ok_or(StoreError::MissingMetadata {
            kind: "Token",
            field: "name",
        })?;
    Ok((namespace, name))
}

#[async_trait]
impl TokenStore for KubeStore {
    async fn get_token(&self, namespace: &str, name: &str) -> Result<Option<Token>, StoreError> {
        Ok(self.tokens(namespace).get_opt(name).await?)
    }

    async fn update_token(&self, token: &Token) -> Result<Token, StoreError> {
        let (namespace, name) = token_identity(token)?;
        self.tokens(namespace)
            .replace(name, &PostParams::default(), token)
            .await
            .map_err(|e| StoreError::from_kube(e, "Token", format!("{namespace}/{name}")))
    }

    async fn update_token_status(&self, token: &Token) -> Result<Token, StoreError> {
        let (namespace, name) = token_identity(token)?;
        // resourceVersion in a merge patch acts as a precondition
        let patch = json!({
            "metadata": { "resourceVersion": token.metadata.resource_version },
            "status": token.status,
        });
        debug!(
            resource.name = name,
            resource.namespace = namespace,
            "Patching Token status"
        );
        self.tokens(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(e, "Token", format!("{namespace}/{name}")))
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, StoreError> {
        let list = self.secrets(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.secrets(namespace).get_opt(name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let namespace = secret
            .metadata
            .namespace
            .as_deref()
            .ok_or(StoreError::MissingMetadata {
                kind: "Secret",
                field: "namespace",
            })?;
        let key = format!(
            "{namespace}/{}",
            secret.metadata.name.as_deref().unwrap_or_default()
        );
        self.secrets(namespace)
            .create(&PostParams::default(), secret)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", key))
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        match self
            .secrets(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(StoreError::Kube(e)),
        }
    }
}
