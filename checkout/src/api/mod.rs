//! Checkout backend service.
//!
//! [`CheckoutApi`] is the seam between the workflow and the network. The
//! HTTP implementation talks to the ticketing backend; the mock simulates it
//! in memory for tests and the demo.

use crate::error::CheckoutResult;
use crate::types::{
    CartItem, CheckoutRequestId, ContactDetails, Discount, Money, OrderId, PaymentStatus,
    PaymentStatusReport, TaxRate, Totals,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod envelope;
pub mod http;
pub mod mock;

pub use http::HttpCheckoutApi;
pub use mock::MockCheckoutApi;

/// Calls the checkout backend makes available to the client
///
/// Every method normalises the server's mixed success/error shapes into a
/// single `Result`.
#[async_trait]
pub trait CheckoutApi: Send + Sync {
    /// `POST /checkout/process`
    async fn process_checkout(&self, request: &CheckoutRequest)
    -> CheckoutResult<CheckoutConfirmation>;

    /// `GET /checkout/payment-status/:checkoutRequestID`
    async fn payment_status(&self, reference: &CheckoutRequestId)
    -> CheckoutResult<PaymentStatusReport>;

    /// `POST /checkout/apply-discount`
    async fn apply_discount(&self, code: &str) -> CheckoutResult<Discount>;

    /// `GET /checkout/summary`
    async fn order_summary(&self) -> CheckoutResult<OrderSummary>;

    /// `GET /checkout/order/:orderId`
    async fn order(&self, order_id: &OrderId) -> CheckoutResult<OrderDetails>;

    /// Guest order creation
    ///
    /// A response with `success: false` is returned as an error.
    async fn create_guest_order(&self, request: &GuestOrderRequest) -> CheckoutResult<GuestOrder>;
}

// ============================================================================
// Requests
// ============================================================================

/// One line of a checkout request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLineItem {
    /// Event or ticket-type id
    pub event_id: String,
    /// Display title
    pub title: String,
    /// Unit price
    pub price: Money,
    /// Number of tickets
    pub quantity: u32,
}

impl From<&CartItem> for CheckoutLineItem {
    fn from(item: &CartItem) -> Self {
        Self {
            event_id: item.id.clone(),
            title: item.title.clone(),
            price: item.price,
            quantity: item.quantity,
        }
    }
}

/// Payment-method specific details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Phone number that receives the mobile-money prompt
    pub phone_number: String,
}

/// Body of `POST /checkout/process`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Cart lines
    pub items: Vec<CheckoutLineItem>,
    /// Billing contact
    pub billing: ContactDetails,
    /// Payment method identifier
    pub payment_method: String,
    /// Payment-specific details
    pub payment_details: PaymentDetails,
    /// Applied discount code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    /// Totals as computed by the client
    pub totals: Totals,
    /// Guest order this checkout pays for, when checking out as a guest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_order_id: Option<OrderId>,
}

impl CheckoutRequest {
    /// Builds a request from the cart and the buyer's choices
    #[must_use]
    pub fn build(
        items: &[CartItem],
        billing: &ContactDetails,
        payment_method: &str,
        phone_number: &str,
        discount: Option<&Discount>,
        tax_rate: TaxRate,
    ) -> Self {
        Self {
            items: items.iter().map(CheckoutLineItem::from).collect(),
            billing: billing.clone(),
            payment_method: payment_method.to_string(),
            payment_details: PaymentDetails {
                phone_number: phone_number.trim().to_string(),
            },
            discount_code: discount.map(|d| d.code.clone()),
            totals: Totals::compute(items, discount, tax_rate),
            guest_order_id: None,
        }
    }

    /// Attach the guest order being paid for
    #[must_use]
    pub fn for_guest_order(mut self, order_id: Option<OrderId>) -> Self {
        self.guest_order_id = order_id;
        self
    }
}

/// Body of the guest order endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestOrderRequest {
    /// Guest contact details
    pub guest_info: ContactDetails,
    /// Cart lines
    pub items: Vec<CheckoutLineItem>,
    /// Order total
    pub total: Money,
}

// ============================================================================
// Responses
// ============================================================================

/// Result of a successful `POST /checkout/process`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutConfirmation {
    /// Order created by the server
    #[serde(default, alias = "_id")]
    pub order_id: Option<OrderId>,
    /// Mobile-money request to poll; absent when no payment prompt was sent
    #[serde(default, alias = "CheckoutRequestID")]
    pub checkout_request_id: Option<CheckoutRequestId>,
    /// Server message for the buyer
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of a successful guest order call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestOrder {
    /// Order id
    #[serde(default, rename = "_id", alias = "id")]
    pub id: Option<OrderId>,
    /// Server message for the buyer
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `GET /checkout/summary`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderSummary {
    /// Lines being bought
    pub items: Vec<CheckoutLineItem>,
    /// Sum of lines
    pub subtotal: Money,
    /// Discount taken off
    pub discount_amount: Money,
    /// Tax
    pub tax: Money,
    /// Amount due
    pub total: Money,
}

/// Body of `GET /checkout/order/:orderId`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    /// Order id
    #[serde(rename = "_id", alias = "id")]
    pub id: OrderId,
    /// Order status as reported by the server
    #[serde(default)]
    pub status: String,
    /// Lines bought
    #[serde(default)]
    pub items: Vec<CheckoutLineItem>,
    /// Amount charged
    #[serde(default)]
    pub total: Money,
    /// Payment status, when a payment was attempted
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
