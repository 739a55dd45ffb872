//! Payment status polling against scripted backends, on paused time

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use async_trait::async_trait;
use eventdesk_checkout::api::{
    CheckoutApi, CheckoutConfirmation, CheckoutRequest, GuestOrder, GuestOrderRequest,
    MockCheckoutApi, OrderDetails, OrderSummary,
};
use eventdesk_checkout::polling::INSUFFICIENT_FUNDS_MESSAGE;
use eventdesk_checkout::types::{
    CheckoutRequestId, Discount, OrderId, PaymentOutcome, PaymentStatus, PaymentStatusReport,
};
use eventdesk_checkout::{CheckoutError, CheckoutResult, PaymentPoller, PollConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn reference() -> CheckoutRequestId {
    CheckoutRequestId::new("ws_CO_191220191020363925")
}

fn statuses(list: &[PaymentStatus]) -> Vec<PaymentStatusReport> {
    list.iter().cloned().map(PaymentStatusReport::new).collect()
}

/// Serves scripted status responses, errors included; everything else is
/// delegated to the in-memory mock
struct ScriptedStatusApi {
    responses: Mutex<VecDeque<CheckoutResult<PaymentStatusReport>>>,
    calls: AtomicU32,
    inner: MockCheckoutApi,
}

impl ScriptedStatusApi {
    fn new(responses: Vec<CheckoutResult<PaymentStatusReport>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicU32::new(0),
            inner: MockCheckoutApi::new(),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckoutApi for ScriptedStatusApi {
    async fn process_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> CheckoutResult<CheckoutConfirmation> {
        self.inner.process_checkout(request).await
    }

    async fn payment_status(
        &self,
        _reference: &CheckoutRequestId,
    ) -> CheckoutResult<PaymentStatusReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PaymentStatusReport::new(PaymentStatus::Processing)))
    }

    async fn apply_discount(&self, code: &str) -> CheckoutResult<Discount> {
        self.inner.apply_discount(code).await
    }

    async fn order_summary(&self) -> CheckoutResult<OrderSummary> {
        self.inner.order_summary().await
    }

    async fn order(&self, order_id: &OrderId) -> CheckoutResult<OrderDetails> {
        self.inner.order(order_id).await
    }

    async fn create_guest_order(&self, request: &GuestOrderRequest) -> CheckoutResult<GuestOrder> {
        self.inner.create_guest_order(request).await
    }
}

#[tokio::test(start_paused = true)]
async fn completes_on_third_poll() {
    let api = Arc::new(MockCheckoutApi::new().with_statuses(statuses(&[
        PaymentStatus::Pending,
        PaymentStatus::Pending,
        PaymentStatus::Completed,
    ])));
    let poller = PaymentPoller::new(api.clone(), PollConfig::default());
    let started = Instant::now();

    let outcome = poller.poll(&reference()).await.unwrap();

    assert!(outcome.is_paid());
    assert_eq!(api.status_calls(), 3);
    // First poll one interval after start, then one per interval
    assert_eq!(started.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn times_out_after_exactly_max_attempts() {
    let api = Arc::new(MockCheckoutApi::new());
    let poller = PaymentPoller::new(api.clone(), PollConfig::default());

    let error = poller.poll(&reference()).await.unwrap_err();

    assert_eq!(
        error,
        CheckoutError::PaymentTimeout {
            attempts: 60,
            last_status: PaymentStatus::Processing,
        }
    );
    assert_eq!(api.status_calls(), 60);
}

#[tokio::test(start_paused = true)]
async fn short_budget_is_respected() {
    let api = Arc::new(MockCheckoutApi::new());
    let config = PollConfig {
        interval: Duration::from_millis(100),
        max_attempts: 3,
    };
    let started = Instant::now();

    let error = PaymentPoller::new(api.clone(), config)
        .poll(&reference())
        .await
        .unwrap_err();

    assert!(error.is_timeout());
    assert_eq!(api.status_calls(), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn insufficient_funds_is_reported() {
    let api = Arc::new(MockCheckoutApi::new().with_statuses([
        PaymentStatusReport::new(PaymentStatus::Pending),
        PaymentStatusReport::failed("2006", "The balance is insufficient for the transaction."),
    ]));

    let outcome = PaymentPoller::new(api, PollConfig::default())
        .poll(&reference())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PaymentOutcome::Failed {
            result_code: Some("2006".to_string()),
            message: INSUFFICIENT_FUNDS_MESSAGE.to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn transport_errors_use_an_attempt_and_polling_continues() {
    let api = Arc::new(ScriptedStatusApi::new(vec![
        Err(CheckoutError::Transport("connection reset".to_string())),
        Ok(PaymentStatusReport::new(PaymentStatus::Processing)),
        Err(CheckoutError::server("Gateway timeout")),
        Ok(PaymentStatusReport::new(PaymentStatus::Completed)),
    ]));

    let outcome = PaymentPoller::new(api.clone(), PollConfig::default())
        .poll(&reference())
        .await
        .unwrap();

    assert!(outcome.is_paid());
    assert_eq!(api.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn errors_count_toward_the_budget() {
    let api = Arc::new(ScriptedStatusApi::new(
        (0..5)
            .map(|_| Err(CheckoutError::Transport("offline".to_string())))
            .collect(),
    ));
    let config = PollConfig {
        interval: Duration::from_secs(1),
        max_attempts: 5,
    };

    let error = PaymentPoller::new(api.clone(), config)
        .poll(&reference())
        .await
        .unwrap_err();

    assert!(error.is_timeout());
    assert_eq!(api.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn expired_session_stops_polling() {
    let api = Arc::new(ScriptedStatusApi::new(vec![
        Ok(PaymentStatusReport::new(PaymentStatus::Pending)),
        Err(CheckoutError::AuthExpired),
    ]));

    let error = PaymentPoller::new(api.clone(), PollConfig::default())
        .poll(&reference())
        .await
        .unwrap_err();

    assert_eq!(error, CheckoutError::AuthExpired);
    assert_eq!(api.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_handle_stops_polling() {
    let api = Arc::new(MockCheckoutApi::new());
    let mut handle = PaymentPoller::new(api.clone(), PollConfig::default()).spawn(reference());

    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.cancel();

    assert_eq!(handle.outcome().await, Err(CheckoutError::Cancelled));
    assert!(handle.is_finished());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_polling() {
    let api = Arc::new(MockCheckoutApi::new());
    let handle = PaymentPoller::new(api.clone(), PollConfig::default()).spawn(reference());

    drop(handle);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(api.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn token_cancellation_is_prompt() {
    let api = MockCheckoutApi::new();
    let token = CancellationToken::new();
    let config = PollConfig::default();
    let reference = reference();

    let poll = eventdesk_checkout::poll_payment_status(&api, &reference, &config, &token);
    token.cancel();

    assert_eq!(poll.await, Err(CheckoutError::Cancelled));
    assert_eq!(api.status_calls(), 0);
}
