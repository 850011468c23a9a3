//! Common test utilities for reconciler integration tests
//!
//! Provides an in-memory [`TokenStore`] that behaves like the API server where
//! the reconciler relies on it, a manually advanced clock, an event recorder
//! and Token fixtures.

#![allow(dead_code, reason = "Each test binary uses a different subset of the harness")]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::{ObjectReference, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::runtime::events::EventType;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use token_rotation_controller::config::ControllerConfig;
use token_rotation_controller::constants::{
    CONDITION_TYPE_OBJECT, MESSAGE_OBJECT_INITIALIZED, REASON_FINALIZER_ADDED,
    REASON_OBJECT_INITIALIZED, SERVICE_ACCOUNT_TOKEN_SECRET_TYPE, TOKEN_FINALIZER,
};
use token_rotation_controller::controller::events::EventPublisher;
use token_rotation_controller::controller::reconciler::{
    reconcile_token, to_k8s_time, Clock, Reconciler, ReconcilerError, StoreError, TokenStore,
};
use token_rotation_controller::crd::{Condition, Phase, Token, TokenSpec, TokenStatus};

pub const NAMESPACE: &str = "default";

/// Start of every test timeline
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(at),
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }

    /// Jump to `secs` after [`epoch`]
    pub fn set_offset_secs(&self, secs: i64) {
        *self.now.lock().unwrap() = epoch() + chrono::Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Default)]
pub struct WriteCounters {
    pub token_updates: AtomicUsize,
    pub status_updates: AtomicUsize,
    pub secret_creates: AtomicUsize,
    pub secret_deletes: AtomicUsize,
}

impl WriteCounters {
    pub fn total(&self) -> usize {
        self.token_updates.load(Ordering::SeqCst)
            + self.status_updates.load(Ordering::SeqCst)
            + self.secret_creates.load(Ordering::SeqCst)
            + self.secret_deletes.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct State {
    tokens: BTreeMap<(String, String), Token>,
    secrets: BTreeMap<(String, String), Secret>,
    next_version: u64,
}

impl State {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

/// Store calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    UpdateToken,
    UpdateStatus,
    ListSecrets,
    CreateSecret,
    DeleteSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The API server could not be reached
    Unavailable,
    /// Another writer moved the `resourceVersion` on
    Conflict,
}

/// In-memory store with API server semantics for the parts the reconciler uses:
///
/// - writes are rejected when `resourceVersion` is stale
/// - `update_token` never touches status, `update_token_status` touches nothing else
/// - a Token marked for deletion disappears once its finalizers are empty
/// - creation timestamps are assigned by the store from its clock
///
/// Faults queued with [`InMemoryStore::fail_next`] fire once, before the call
/// has any effect.
#[derive(Debug)]
pub struct InMemoryStore {
    state: Mutex<State>,
    clock: Arc<ManualClock>,
    faults: Mutex<Vec<(StoreOp, Fault)>>,
    pub counters: WriteCounters,
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

fn conflict(kind: &'static str, namespace: &str, name: &str) -> StoreError {
    StoreError::Conflict {
        kind,
        key: format!("{namespace}/{name}"),
    }
}

impl InMemoryStore {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            faults: Mutex::new(Vec::new()),
            counters: WriteCounters::default(),
        }
    }

    /// Make the next `op` call fail with `fault`
    pub fn fail_next(&self, op: StoreOp, fault: Fault) {
        self.faults.lock().unwrap().push((op, fault));
    }

    fn check_fault(&self, op: StoreOp, kind: &'static str, target: &str) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().unwrap();
        let Some(index) = faults.iter().position(|(queued, _)| *queued == op) else {
            return Ok(());
        };
        let (_, fault) = faults.remove(index);
        Err(match fault {
            Fault::Unavailable => StoreError::Kube(kube::Error::Service(
                format!("connection refused while calling {op:?}").into(),
            )),
            Fault::Conflict => StoreError::Conflict {
                kind,
                key: target.to_string(),
            },
        })
    }

    /// Store `token` as if it was just created by a user
    pub fn insert_token(&self, mut token: Token) -> Token {
        let mut state = self.state.lock().unwrap();
        let name = token.metadata.name.clone().unwrap();
        let namespace = token
            .metadata
            .namespace
            .get_or_insert_with(|| NAMESPACE.to_string())
            .clone();
        token.metadata.uid.get_or_insert_with(|| format!("uid-{name}"));
        token.metadata.creation_timestamp = Some(to_k8s_time(self.clock.now()).unwrap());
        token.metadata.resource_version = Some(state.bump_version());
        state.tokens.insert(key(&namespace, &name), token.clone());
        token
    }

    pub fn token(&self, name: &str) -> Option<Token> {
        let state = self.state.lock().unwrap();
        state.tokens.get(&key(NAMESPACE, name)).cloned()
    }

    /// Request deletion the way `kubectl delete` does
    pub fn mark_for_deletion(&self, name: &str) {
        let now = to_k8s_time(self.clock.now()).unwrap();
        let mut state = self.state.lock().unwrap();
        let version = state.bump_version();
        let k = key(NAMESPACE, name);
        let Some(token) = state.tokens.get_mut(&k) else {
            return;
        };
        token.metadata.deletion_timestamp = Some(now);
        token.metadata.resource_version = Some(version);
        if token.metadata.finalizers.as_ref().is_none_or(Vec::is_empty) {
            state.tokens.remove(&k);
        }
    }

    /// Simulate a concurrent writer moving the resourceVersion on
    pub fn touch_token(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump_version();
        if let Some(token) = state.tokens.get_mut(&key(NAMESPACE, name)) {
            token.metadata.resource_version = Some(version);
        }
    }

    /// Store a secret that was not issued by the controller
    pub fn insert_secret(&self, secret: Secret) {
        let mut state = self.state.lock().unwrap();
        let namespace = secret.metadata.namespace.clone().unwrap();
        let name = secret.metadata.name.clone().unwrap();
        state.secrets.insert(key(&namespace, &name), secret);
    }

    /// Delete a secret behind the controller's back
    pub fn remove_secret(&self, name: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.secrets.remove(&key(NAMESPACE, name)).is_some()
    }

    pub fn secret(&self, name: &str) -> Option<Secret> {
        let state = self.state.lock().unwrap();
        state.secrets.get(&key(NAMESPACE, name)).cloned()
    }

    pub fn secret_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.secrets.keys().map(|(_, name)| name.clone()).collect()
    }

    /// Names of secrets owned by the Token `name`, sorted
    pub fn owned_secret_names(&self, name: &str) -> Vec<String> {
        let uid = format!("uid-{name}");
        let state = self.state.lock().unwrap();
        state
            .secrets
            .values()
            .filter(|secret| {
                secret
                    .metadata
                    .owner_references
                    .iter()
                    .flatten()
                    .any(|owner| owner.uid == uid)
            })
            .filter_map(|secret| secret.metadata.name.clone())
            .collect()
    }

    pub fn writes(&self) -> usize {
        self.counters.total()
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn get_token(&self, namespace: &str, name: &str) -> Result<Option<Token>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.tokens.get(&key(namespace, name)).cloned())
    }

    async fn update_token(&self, token: &Token) -> Result<Token, StoreError> {
        let namespace = token.metadata.namespace.clone().unwrap();
        let name = token.metadata.name.clone().unwrap();
        let k = key(&namespace, &name);
        self.check_fault(StoreOp::UpdateToken, "Token", &format!("{namespace}/{name}"))?;

        let mut state = self.state.lock().unwrap();
        let Some(stored) = state.tokens.get(&k).cloned() else {
            return Err(conflict("Token", &namespace, &name));
        };
        if stored.metadata.resource_version != token.metadata.resource_version {
            return Err(conflict("Token", &namespace, &name));
        }

        let mut updated = token.clone();
        updated.status = stored.status;
        updated.metadata.uid = stored.metadata.uid;
        updated.metadata.creation_timestamp = stored.metadata.creation_timestamp;
        updated.metadata.deletion_timestamp = stored.metadata.deletion_timestamp;
        updated.metadata.resource_version = Some(state.bump_version());
        self.counters.token_updates.fetch_add(1, Ordering::SeqCst);

        let finalized = updated.metadata.deletion_timestamp.is_some()
            && updated.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        if finalized {
            state.tokens.remove(&k);
        } else {
            state.tokens.insert(k, updated.clone());
        }
        Ok(updated)
    }

    async fn update_token_status(&self, token: &Token) -> Result<Token, StoreError> {
        let namespace = token.metadata.namespace.clone().unwrap();
        let name = token.metadata.name.clone().unwrap();
        let k = key(&namespace, &name);
        self.check_fault(StoreOp::UpdateStatus, "Token", &format!("{namespace}/{name}"))?;

        let mut state = self.state.lock().unwrap();
        let version = state.bump_version();
        let Some(stored) = state.tokens.get_mut(&k) else {
            return Err(conflict("Token", &namespace, &name));
        };
        if stored.metadata.resource_version != token.metadata.resource_version {
            return Err(conflict("Token", &namespace, &name));
        }
        stored.status.clone_from(&token.status);
        stored.metadata.resource_version = Some(version);
        self.counters.status_updates.fetch_add(1, Ordering::SeqCst);
        Ok(stored.clone())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>, StoreError> {
        self.check_fault(StoreOp::ListSecrets, "Secret", namespace)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .secrets
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, secret)| secret.clone())
            .collect())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.secrets.get(&key(namespace, name)).cloned())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let namespace = secret.metadata.namespace.clone().unwrap();
        let name = secret.metadata.name.clone().unwrap();
        let k = key(&namespace, &name);
        self.check_fault(StoreOp::CreateSecret, "Secret", &format!("{namespace}/{name}"))?;

        let mut state = self.state.lock().unwrap();
        if state.secrets.contains_key(&k) {
            return Err(StoreError::AlreadyExists {
                kind: "Secret",
                key: format!("{namespace}/{name}"),
            });
        }
        let mut created = secret.clone();
        created.metadata.creation_timestamp = Some(to_k8s_time(self.clock.now()).unwrap());
        created.metadata.resource_version = Some(state.bump_version());
        state.secrets.insert(k, created.clone());
        self.counters.secret_creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.check_fault(StoreOp::DeleteSecret, "Secret", &format!("{namespace}/{name}"))?;
        let mut state = self.state.lock().unwrap();
        if state.secrets.remove(&key(namespace, name)).is_some() {
            self.counters.secret_deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub object: String,
    pub warning: bool,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

/// Event publisher that keeps everything it is given
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            object: resource_ref.name.clone().unwrap_or_default(),
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            action: action.to_string(),
            note,
        });
    }
}

/// Reconciler wired to in-memory collaborators
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryStore>,
    pub events: Arc<RecordingEventPublisher>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let store = Arc::new(InMemoryStore::new(Arc::clone(&clock)));
        let events = Arc::new(RecordingEventPublisher::default());
        let reconciler = Reconciler::new(
            Arc::clone(&store) as Arc<dyn TokenStore>,
            Arc::clone(&events) as Arc<dyn EventPublisher>,
            config,
        )
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        Self {
            clock,
            store,
            events,
            reconciler: Arc::new(reconciler),
        }
    }

    /// Run one reconcile pass for `name`
    pub async fn pass(&self, name: &str) -> Result<Option<Duration>, ReconcilerError> {
        reconcile_token(&self.reconciler, NAMESPACE, name).await
    }

    /// Run passes until one converges or the Token is gone; returns the pass count
    pub async fn converge(&self, name: &str) -> usize {
        for passes in 1..=10 {
            let result = self.pass(name).await.expect("reconcile pass failed");
            if result.is_some() || self.store.token(name).is_none() {
                return passes;
            }
        }
        panic!("Token {name} did not converge within 10 passes");
    }

    pub fn token(&self, name: &str) -> Token {
        self.store.token(name).expect("token should exist")
    }

    pub fn status(&self, name: &str) -> TokenStatus {
        self.token(name).status.expect("token should have a status")
    }

    /// Let detached event publishing finish
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn spec(rotation: Option<i64>, grace: Option<i64>) -> TokenSpec {
    TokenSpec {
        service_account_name: "builder".to_string(),
        rotation_period_seconds: rotation,
        deletion_grace_period_seconds: grace,
    }
}

/// A Token as submitted by a user
pub fn token(name: &str, rotation: Option<i64>, grace: Option<i64>) -> Token {
    let mut token = Token::new(name, spec(rotation, grace));
    token.metadata.namespace = Some(NAMESPACE.to_string());
    token
}

/// A Token the controller has already finalized and moved to `pending`
pub fn initialized_token(name: &str, rotation: Option<i64>, grace: Option<i64>) -> Token {
    let mut token = token(name, rotation, grace);
    token.metadata.finalizers = Some(vec![TOKEN_FINALIZER.to_string()]);
    token.status = Some(TokenStatus {
        phase: Some(Phase::Pending),
        conditions: vec![Condition::satisfied(
            CONDITION_TYPE_OBJECT,
            REASON_FINALIZER_ADDED,
            MESSAGE_OBJECT_INITIALIZED,
            epoch(),
        )],
        message: Some(MESSAGE_OBJECT_INITIALIZED.to_string()),
        reason: Some(REASON_OBJECT_INITIALIZED.to_string()),
        secret_name: None,
    });
    token
}

/// A token secret owned by some other Token
pub fn foreign_secret(name: &str, owner_uid: &str, created: DateTime<Utc>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            creation_timestamp: Some(to_k8s_time(created).unwrap()),
            owner_references: Some(vec![OwnerReference {
                api_version: "serviceaccount.kubetrail.io/v1beta1".to_string(),
                kind: "Token".to_string(),
                name: "someone-else".to_string(),
                uid: owner_uid.to_string(),
                ..OwnerReference::default()
            }]),
            ..ObjectMeta::default()
        },
        type_: Some(SERVICE_ACCOUNT_TOKEN_SECRET_TYPE.to_string()),
        ..Secret::default()
    }
}
