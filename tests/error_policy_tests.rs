//! Requeue decisions for failed reconciliations

mod common;

use common::{token, Harness};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use token_rotation_controller::controller::reconciler::{ReconcilerError, StoreError};
use token_rotation_controller::runtime::error_policy::handle_reconciliation_error;

fn conflict() -> ReconcilerError {
    ReconcilerError::Store(StoreError::Conflict {
        kind: "Token",
        key: "default/t1".to_string(),
    })
}

#[tokio::test]
async fn test_failures_back_off_with_fibonacci_delays() {
    let harness = Harness::new();
    let obj = Arc::new(token("t1", None, None));
    let err = ReconcilerError::MissingField("uid");

    let delays: Vec<Action> = (0..5)
        .map(|_| handle_reconciliation_error(Arc::clone(&obj), &err, Arc::clone(&harness.reconciler)))
        .collect();

    let expected: Vec<Action> = [5, 5, 10, 15, 25]
        .into_iter()
        .map(|secs| Action::requeue(Duration::from_secs(secs)))
        .collect();
    assert_eq!(delays, expected);
}

#[tokio::test]
async fn test_backoff_is_tracked_per_token() {
    let harness = Harness::new();
    let err = ReconcilerError::MissingField("uid");
    let t1 = Arc::new(token("t1", None, None));
    let t2 = Arc::new(token("t2", None, None));

    for _ in 0..4 {
        handle_reconciliation_error(Arc::clone(&t1), &err, Arc::clone(&harness.reconciler));
    }
    let action = handle_reconciliation_error(t2, &err, Arc::clone(&harness.reconciler));

    assert_eq!(action, Action::requeue(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_conflicts_requeue_quickly_without_backoff() {
    let harness = Harness::new();
    let obj = Arc::new(token("t1", None, None));

    for _ in 0..3 {
        let action =
            handle_reconciliation_error(Arc::clone(&obj), &conflict(), Arc::clone(&harness.reconciler));
        assert_eq!(action, Action::requeue(Duration::from_secs(2)));
    }

    // The conflicts did not advance the backoff
    let action = handle_reconciliation_error(
        obj,
        &ReconcilerError::MissingField("uid"),
        Arc::clone(&harness.reconciler),
    );
    assert_eq!(action, Action::requeue(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_success_resets_backoff() {
    let harness = Harness::new();
    harness.store.insert_token(token("t1", None, None));
    let err = ReconcilerError::MissingField("uid");
    let obj = Arc::new(harness.token("t1"));

    for _ in 0..4 {
        handle_reconciliation_error(Arc::clone(&obj), &err, Arc::clone(&harness.reconciler));
    }
    token_rotation_controller::controller::reconciler::reconcile(
        Arc::clone(&obj),
        Arc::clone(&harness.reconciler),
    )
    .await
    .unwrap();

    let action = handle_reconciliation_error(obj, &err, Arc::clone(&harness.reconciler));
    assert_eq!(action, Action::requeue(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_failure_event_is_debounced() {
    let harness = Harness::new();
    let obj = Arc::new(token("t1", None, None));
    let err = ReconcilerError::MissingField("uid");

    for _ in 0..3 {
        handle_reconciliation_error(Arc::clone(&obj), &err, Arc::clone(&harness.reconciler));
    }
    harness.settle().await;

    let events = harness.events.events();
    assert_eq!(events.len(), 1, "repeated failures publish one event");
    assert_eq!(events[0].reason, "ReconcileFailed");
    assert!(events[0].warning);
    assert_eq!(events[0].note.as_deref(), Some("Token is missing metadata.uid"));
}
