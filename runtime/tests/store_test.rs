//! Integration tests for Store effect execution, feedback and cancellation

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use eventdesk_core::effect::{Effect, EffectId};
use eventdesk_core::reducer::Reducer;
use eventdesk_core::{SmallVec, smallvec};
use eventdesk_runtime::{Store, StoreError};
use std::time::Duration;

const TICKER: EffectId = EffectId::new("ticker");

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    /// Start a delayed tick under the cancellable id
    StartTicker { after_ms: u64 },
    /// Stop the ticker
    StopTicker,
    /// Tick delivered by the delay
    Tick,
    /// Fetch a value through a future effect
    Fetch { value: u32 },
    /// Result of a fetch
    Fetched { value: u32 },
    /// Two fetches, one after the other
    FetchBoth { first: u32, second: u32 },
}

#[derive(Debug, Clone, Default)]
struct TestState {
    ticks: u32,
    fetched: Vec<u32>,
}

struct TestReducer;

impl Reducer for TestReducer {
    type State = TestState;
    type Action = TestAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TestAction::StartTicker { after_ms } => smallvec![
                Effect::Delay {
                    duration: Duration::from_millis(after_ms),
                    action: Box::new(TestAction::Tick),
                }
                .cancellable(TICKER)
            ],
            TestAction::StopTicker => smallvec![Effect::Cancel(TICKER)],
            TestAction::Tick => {
                state.ticks += 1;
                SmallVec::new()
            },
            TestAction::Fetch { value } => smallvec![Effect::future(async move {
                Some(TestAction::Fetched { value })
            })],
            TestAction::Fetched { value } => {
                state.fetched.push(value);
                SmallVec::new()
            },
            TestAction::FetchBoth { first, second } => smallvec![Effect::chain(vec![
                Effect::future(async move { Some(TestAction::Fetched { value: first }) }),
                Effect::future(async move { Some(TestAction::Fetched { value: second }) }),
            ])],
        }
    }
}

fn store() -> Store<TestState, TestAction, (), TestReducer> {
    Store::new(TestState::default(), TestReducer, ())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn future_effect_feeds_action_back() {
    let store = store();

    let result = store
        .send_and_wait_for(
            TestAction::Fetch { value: 7 },
            |a| matches!(a, TestAction::Fetched { .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(result, TestAction::Fetched { value: 7 });
    assert_eq!(store.state(|s| s.fetched.clone()).await, vec![7]);
}

#[tokio::test]
async fn sequential_effects_run_in_order() {
    let store = store();

    let mut handle = store
        .send(TestAction::FetchBoth { first: 1, second: 2 })
        .await
        .unwrap();
    handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

    assert_eq!(store.state(|s| s.fetched.clone()).await, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn delay_fires_when_not_cancelled() {
    let store = store();

    let mut handle = store
        .send(TestAction::StartTicker { after_ms: 500 })
        .await
        .unwrap();
    assert!(store.is_running(TICKER));

    handle.wait().await;

    assert_eq!(store.state(|s| s.ticks).await, 1);
    assert!(!store.is_running(TICKER));
}

#[tokio::test(start_paused = true)]
async fn cancel_effect_prevents_action() {
    let store = store();

    let mut handle = store
        .send(TestAction::StartTicker { after_ms: 500 })
        .await
        .unwrap();
    store.send(TestAction::StopTicker).await.unwrap();

    handle.wait().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(store.state(|s| s.ticks).await, 0);
    assert!(!store.is_running(TICKER));
}

#[tokio::test(start_paused = true)]
async fn restarting_cancellable_effect_replaces_previous() {
    let store = store();

    store
        .send(TestAction::StartTicker { after_ms: 500 })
        .await
        .unwrap();
    let mut second = store
        .send(TestAction::StartTicker { after_ms: 800 })
        .await
        .unwrap();

    second.wait().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(store.state(|s| s.ticks).await, 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_effects_and_rejects_actions() {
    let store = store();

    store
        .send(TestAction::StartTicker { after_ms: 500 })
        .await
        .unwrap();
    store.shutdown();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(store.state(|s| s.ticks).await, 0);
    assert!(matches!(
        store.send(TestAction::Tick).await,
        Err(StoreError::ShutdownInProgress)
    ));
}

#[tokio::test(start_paused = true)]
async fn send_and_wait_for_times_out_without_match() {
    let store = store();

    let result = store
        .send_and_wait_for(
            TestAction::StartTicker { after_ms: 5_000 },
            |a| matches!(a, TestAction::Tick),
            Duration::from_secs(1),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Timeout)));
}
