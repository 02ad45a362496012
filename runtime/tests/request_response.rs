//! Integration tests for Store request/response and state notification
//!
//! Covers the pattern used by store facades: send a command, wait for the
//! outcome action carrying the same correlation id, then read the state the
//! outcome produced.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::time::Duration;
use tasklist_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use tasklist_runtime::{Store, StoreError};

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    /// Start a remote request with correlation ID
    Request { id: u64, succeed: bool, delay_ms: u64 },
    /// Request succeeded (terminal action)
    Completed { id: u64 },
    /// Request failed (terminal action)
    Failed { id: u64, error: String },
    /// Recorded without any effect
    Note { id: u64 },
}

#[derive(Debug, Clone, Default)]
struct TestState {
    in_flight: Vec<u64>,
    completed: Vec<u64>,
}

#[derive(Clone)]
struct TestEnvironment;

#[derive(Clone)]
struct TestReducer;

impl Reducer for TestReducer {
    type State = TestState;
    type Action = TestAction;
    type Environment = TestEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TestAction::Request { id, succeed, delay_ms } => {
                state.in_flight.push(id);
                smallvec![Effect::task(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    if succeed {
                        TestAction::Completed { id }
                    } else {
                        TestAction::Failed {
                            id,
                            error: "remote refused".to_string(),
                        }
                    }
                })]
            },
            TestAction::Completed { id } => {
                state.in_flight.retain(|pending| *pending != id);
                state.completed.push(id);
                SmallVec::new()
            },
            TestAction::Failed { id, .. } => {
                state.in_flight.retain(|pending| *pending != id);
                SmallVec::new()
            },
            TestAction::Note { .. } => SmallVec::new(),
        }
    }
}

fn new_store() -> Store<TestState, TestAction, TestEnvironment, TestReducer> {
    Store::new(TestState::default(), TestReducer, TestEnvironment)
}

fn is_outcome_for(id: u64) -> impl Fn(&TestAction) -> bool {
    move |action| match action {
        TestAction::Completed { id: done } | TestAction::Failed { id: done, .. } => *done == id,
        TestAction::Request { .. } | TestAction::Note { .. } => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_send_and_wait_for_success() {
    let store = new_store();

    let result = store
        .send_and_wait_for(
            TestAction::Request { id: 1, succeed: true, delay_ms: 5 },
            is_outcome_for(1),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(result, TestAction::Completed { id: 1 });
}

#[tokio::test]
async fn test_state_applied_before_outcome_is_observed() {
    let store = new_store();

    store
        .send_and_wait_for(
            TestAction::Request { id: 7, succeed: true, delay_ms: 0 },
            is_outcome_for(7),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    // No sleep: the outcome is delivered only after it has been reduced
    let (in_flight, completed) = store
        .state(|s| (s.in_flight.clone(), s.completed.clone()))
        .await;
    assert!(in_flight.is_empty());
    assert_eq!(completed, vec![7]);
}

#[tokio::test]
async fn test_send_and_wait_for_failure_outcome() {
    let store = new_store();

    let result = store
        .send_and_wait_for(
            TestAction::Request { id: 3, succeed: false, delay_ms: 0 },
            is_outcome_for(3),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert!(matches!(result, TestAction::Failed { id: 3, .. }));
    assert!(store.state(|s| s.completed.is_empty()).await);
}

#[tokio::test]
async fn test_send_and_wait_for_timeout() {
    let store = new_store();

    let result = store
        .send_and_wait_for(
            TestAction::Request { id: 9, succeed: true, delay_ms: 200 },
            is_outcome_for(9),
            Duration::from_millis(20),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Timeout)));
}

#[tokio::test]
async fn test_correlation_id_filtering() {
    let store = Arc::new(new_store());

    // The slower request is issued first; each caller still gets its own outcome
    let store1 = Arc::clone(&store);
    let slow = tokio::spawn(async move {
        store1
            .send_and_wait_for(
                TestAction::Request { id: 1, succeed: true, delay_ms: 40 },
                is_outcome_for(1),
                Duration::from_secs(1),
            )
            .await
    });

    let store2 = Arc::clone(&store);
    let fast = tokio::spawn(async move {
        store2
            .send_and_wait_for(
                TestAction::Request { id: 2, succeed: false, delay_ms: 0 },
                is_outcome_for(2),
                Duration::from_secs(1),
            )
            .await
    });

    let slow = slow.await.expect("Task 1 panicked").unwrap();
    let fast = fast.await.expect("Task 2 panicked").unwrap();

    assert_eq!(slow, TestAction::Completed { id: 1 });
    assert!(matches!(fast, TestAction::Failed { id: 2, .. }));
}

#[tokio::test]
async fn test_many_concurrent_requests_each_get_their_outcome() {
    let store = new_store();

    let waiters: Vec<_> = (0..200_u64)
        .map(|id| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .send_and_wait_for(
                        TestAction::Request { id, succeed: id % 3 != 0, delay_ms: 5 },
                        is_outcome_for(id),
                        Duration::from_secs(5),
                    )
                    .await
            })
        })
        .collect();

    for (id, waiter) in (0..200_u64).zip(waiters) {
        let outcome = waiter.await.expect("waiter panicked").unwrap();
        if id % 3 == 0 {
            assert!(matches!(outcome, TestAction::Failed { id: failed, .. } if failed == id));
        } else {
            assert_eq!(outcome, TestAction::Completed { id });
        }
    }

    assert_eq!(store.state(|s| s.completed.len()).await, 133);
    assert!(store.state(|s| s.in_flight.is_empty()).await);
}

#[tokio::test]
async fn test_action_without_effects_reports_no_match() {
    let store = new_store();

    let result = store
        .send_and_wait_for(TestAction::Note { id: 1 }, is_outcome_for(1), Duration::from_secs(1))
        .await;

    assert_eq!(result, Err(StoreError::NoMatchingAction));
}

#[tokio::test]
async fn test_timed_out_request_is_still_applied() {
    let store = new_store();

    let result = store
        .send_and_wait_for(
            TestAction::Request { id: 6, succeed: true, delay_ms: 30 },
            is_outcome_for(6),
            Duration::from_millis(5),
        )
        .await;
    assert_eq!(result, Err(StoreError::Timeout));

    store.shutdown(Duration::from_secs(1)).await.unwrap();
    assert_eq!(store.state(|s| s.completed.clone()).await, vec![6]);
}

#[tokio::test]
async fn test_subscribe_state_notifies_on_each_transition() {
    let store = new_store();
    let mut revisions = store.subscribe_state();
    let start = *revisions.borrow_and_update();

    let mut handle = store
        .send(TestAction::Request { id: 5, succeed: true, delay_ms: 0 })
        .await
        .unwrap();
    handle.wait().await;

    revisions.changed().await.unwrap();
    // One revision for the command, one for the fed-back outcome
    assert_eq!(*revisions.borrow_and_update(), start + 2);
}

#[tokio::test]
async fn test_shutdown_rejects_wait_requests() {
    let store = new_store();
    store.shutdown(Duration::from_millis(100)).await.unwrap();

    let result = store
        .send_and_wait_for(
            TestAction::Request { id: 4, succeed: true, delay_ms: 0 },
            is_outcome_for(4),
            Duration::from_secs(1),
        )
        .await;

    assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
}
