//! In-memory checkout backend for development and testing.
//!
//! Simulates latency over scripted data: discount codes, a queue of payment
//! status reports, and optional failures for each call.

use super::{
    CheckoutApi, CheckoutConfirmation, CheckoutRequest, GuestOrder, GuestOrderRequest,
    OrderDetails, OrderSummary,
};
use crate::error::{CheckoutError, CheckoutResult};
use crate::types::{CheckoutRequestId, Discount, OrderId, PaymentStatus, PaymentStatusReport};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct MockState {
    statuses: VecDeque<PaymentStatusReport>,
    submissions: Vec<CheckoutRequest>,
    guest_requests: Vec<GuestOrderRequest>,
    orders: HashMap<OrderId, OrderDetails>,
    checkout_failure: Option<CheckoutError>,
    discount_failure: Option<CheckoutError>,
    guest_failure: Option<CheckoutError>,
    send_payment_prompt: bool,
}

/// Mock checkout backend
///
/// Once the scripted status queue is drained every poll reports
/// `processing`.
pub struct MockCheckoutApi {
    latency: Duration,
    discounts: HashMap<String, Discount>,
    state: Mutex<MockState>,
    status_calls: AtomicU32,
}

impl Default for MockCheckoutApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCheckoutApi {
    /// Creates a mock with no latency that sends a payment prompt on checkout
    #[must_use]
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            discounts: HashMap::new(),
            state: Mutex::new(MockState {
                send_payment_prompt: true,
                ..MockState::default()
            }),
            status_calls: AtomicU32::new(0),
        }
    }

    /// Delay every call by `latency`
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Accept a discount code (case-insensitive)
    #[must_use]
    pub fn with_discount(mut self, discount: Discount) -> Self {
        self.discounts.insert(discount.code.to_uppercase(), discount);
        self
    }

    /// Queue payment status reports, returned one per poll
    #[must_use]
    pub fn with_statuses<I>(self, reports: I) -> Self
    where
        I: IntoIterator<Item = PaymentStatusReport>,
    {
        self.lock().statuses.extend(reports);
        self
    }

    /// Complete checkouts without a payment prompt (no polling needed)
    #[must_use]
    pub fn without_payment_prompt(self) -> Self {
        self.lock().send_payment_prompt = false;
        self
    }

    /// Fail every checkout submission with `error`
    #[must_use]
    pub fn failing_checkout(self, error: CheckoutError) -> Self {
        self.lock().checkout_failure = Some(error);
        self
    }

    /// Fail every discount call with `error`
    #[must_use]
    pub fn failing_discounts(self, error: CheckoutError) -> Self {
        self.lock().discount_failure = Some(error);
        self
    }

    /// Fail every guest order call with `error`
    #[must_use]
    pub fn failing_guest_orders(self, error: CheckoutError) -> Self {
        self.lock().guest_failure = Some(error);
        self
    }

    /// Number of payment status polls served
    #[must_use]
    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Checkout requests received, oldest first
    #[must_use]
    pub fn submissions(&self) -> Vec<CheckoutRequest> {
        self.lock().submissions.clone()
    }

    /// Guest order requests received, oldest first
    #[must_use]
    pub fn guest_requests(&self) -> Vec<GuestOrderRequest> {
        self.lock().guest_requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl CheckoutApi for MockCheckoutApi {
    async fn process_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> CheckoutResult<CheckoutConfirmation> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.submissions.push(request.clone());
        if let Some(error) = state.checkout_failure.clone() {
            return Err(error);
        }

        let order_id = request
            .guest_order_id
            .clone()
            .unwrap_or_else(|| OrderId::new(format!("ord_{}", Uuid::new_v4().simple())));
        let checkout_request_id = state.send_payment_prompt.then(|| {
            CheckoutRequestId::new(format!(
                "{}{}",
                CheckoutRequestId::PREFIX,
                Uuid::new_v4().simple()
            ))
        });

        state.orders.insert(
            order_id.clone(),
            OrderDetails {
                id: order_id.clone(),
                status: "pending".to_string(),
                items: request.items.clone(),
                total: request.totals.total,
                payment_status: Some(PaymentStatus::Pending),
                created_at: None,
            },
        );

        tracing::info!(
            order_id = %order_id,
            total = %request.totals.total,
            "Mock checkout processed"
        );

        Ok(CheckoutConfirmation {
            order_id: Some(order_id),
            checkout_request_id,
            message: Some("Order placed".to_string()),
        })
    }

    async fn payment_status(
        &self,
        reference: &CheckoutRequestId,
    ) -> CheckoutResult<PaymentStatusReport> {
        self.simulate_latency().await;
        let attempt = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let report = self
            .lock()
            .statuses
            .pop_front()
            .unwrap_or_else(|| PaymentStatusReport::new(PaymentStatus::Processing));

        tracing::debug!(
            checkout_request_id = %reference,
            attempt,
            status = %report.status,
            "Mock payment status served"
        );

        Ok(report)
    }

    async fn apply_discount(&self, code: &str) -> CheckoutResult<Discount> {
        self.simulate_latency().await;

        if let Some(error) = self.lock().discount_failure.clone() {
            return Err(error);
        }

        self.discounts
            .get(&code.trim().to_uppercase())
            .cloned()
            .ok_or_else(|| CheckoutError::server("Invalid or expired discount code"))
    }

    async fn order_summary(&self) -> CheckoutResult<OrderSummary> {
        self.simulate_latency().await;

        let state = self.lock();
        let request = state.submissions.last().ok_or_else(|| CheckoutError::NotFound {
            what: "Order summary".to_string(),
        })?;

        Ok(OrderSummary {
            items: request.items.clone(),
            subtotal: request.totals.subtotal,
            discount_amount: request.totals.discount_amount,
            tax: request.totals.tax,
            total: request.totals.total,
        })
    }

    async fn order(&self, order_id: &OrderId) -> CheckoutResult<OrderDetails> {
        self.simulate_latency().await;

        self.lock()
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| CheckoutError::NotFound {
                what: "Order".to_string(),
            })
    }

    async fn create_guest_order(&self, request: &GuestOrderRequest) -> CheckoutResult<GuestOrder> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.guest_requests.push(request.clone());
        if let Some(error) = state.guest_failure.clone() {
            return Err(error);
        }

        Ok(GuestOrder {
            id: Some(OrderId::new(format!("guest_{}", Uuid::new_v4().simple()))),
            message: Some("Guest order created. Continue to payment.".to_string()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn statuses_are_served_in_order_then_processing() {
        let api = MockCheckoutApi::new().with_statuses([
            PaymentStatusReport::new(PaymentStatus::Pending),
            PaymentStatusReport::new(PaymentStatus::Completed),
        ]);
        let reference = CheckoutRequestId::new("ws_CO_191220191020363925");

        let first = api.payment_status(&reference).await.unwrap();
        let second = api.payment_status(&reference).await.unwrap();
        let third = api.payment_status(&reference).await.unwrap();

        assert_eq!(first.status, PaymentStatus::Pending);
        assert_eq!(second.status, PaymentStatus::Completed);
        assert_eq!(third.status, PaymentStatus::Processing);
        assert_eq!(api.status_calls(), 3);
    }

    #[tokio::test]
    async fn discount_lookup_is_case_insensitive() {
        let api = MockCheckoutApi::new().with_discount(Discount {
            code: "EARLYBIRD".to_string(),
            percentage: 15.0,
            description: "Early bird".to_string(),
        });

        assert!(api.apply_discount(" earlybird ").await.is_ok());
        assert_eq!(
            api.apply_discount("NOPE").await.unwrap_err(),
            CheckoutError::server("Invalid or expired discount code")
        );
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let api = MockCheckoutApi::new();
        let result = api.order(&OrderId::new("missing")).await;
        assert!(matches!(result, Err(CheckoutError::NotFound { .. })));
    }
}
