//! Eventdesk Checkout - client-side checkout for the eventdesk ticketing front end
//!
//! The storefront's views bind to a [`CheckoutStore`] and send it
//! [`CheckoutAction`]s. Everything with behaviour worth owning lives here:
//!
//! - **Wizard**: three-step checkout with an explicit transition table, a
//!   login / register / guest branch, and discount codes
//! - **Payment polling**: fixed-interval status polling with an attempt
//!   budget, cancelled when the buyer leaves the page
//! - **Services**: the checkout backend ([`api::CheckoutApi`]) over HTTP or
//!   in memory, and the event catalog ([`catalog::EventCatalog`])
//! - **Formatting**: price and date display helpers
//!
//! # Architecture
//!
//! ```text
//!   view ──action──▶ Store ──▶ CheckoutReducer ──▶ state
//!                      ▲              │
//!                      │           effects
//!                      │              ▼
//!                      └──action── CheckoutApi / poller / cart
//! ```
//!
//! # Payment Flow
//!
//! ```text
//! SubmitCheckout
//!   → POST /checkout/process
//!   → CheckoutAccepted { checkoutRequestId }
//!   → poll GET /checkout/payment-status/:id every 2s (max 60)
//!   → PaymentSettled(Paid) → Complete, cart cleared
//! ```

#![forbid(unsafe_code)]

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod format;
pub mod polling;
pub mod session;
pub mod types;
pub mod wizard;

pub use config::CheckoutConfig;
pub use error::{CheckoutError, CheckoutResult};
pub use polling::{PaymentPoller, PollConfig, PollHandle, poll_payment_status};
pub use wizard::{
    CHECKOUT_SUBMISSION, CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState,
    CheckoutStep, DISCOUNT_LOOKUP, GUEST_ORDER_REQUEST, PAYMENT_POLL,
};

use eventdesk_runtime::Store;

/// Store running the checkout wizard
pub type CheckoutStore = Store<CheckoutState, CheckoutAction, CheckoutEnvironment, CheckoutReducer>;

/// Creates a store on the order details step
#[must_use]
pub fn checkout_store(state: CheckoutState, environment: CheckoutEnvironment) -> CheckoutStore {
    Store::new(state, CheckoutReducer::new(), environment)
}
