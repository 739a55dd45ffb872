//! Checkout wizard reducer.
//!
//! Drives the three-step checkout (order details, payment, complete) along
//! with the guest branch, discount codes, submission and payment
//! confirmation polling. Every service call is returned as an effect; the
//! reducer itself never touches the network or the cart.

use crate::api::{
    CheckoutApi, CheckoutConfirmation, CheckoutLineItem, CheckoutRequest, GuestOrder,
    GuestOrderRequest,
};
use crate::config::CheckoutConfig;
use crate::error::CheckoutError;
use crate::polling::{PaymentPoller, PollConfig};
use crate::session::{AuthSession, CartStore};
use crate::types::{
    CartItem, CheckoutRequestId, ContactDetails, ContactField, Discount, OrderId, PaymentOutcome,
    TaxRate, Totals,
};
use chrono::{DateTime, Utc};
use eventdesk_core::effect::{Effect, EffectId};
use eventdesk_core::environment::Clock;
use eventdesk_core::reducer::Reducer;
use eventdesk_core::{SmallVec, smallvec};
use std::fmt;
use std::sync::Arc;

/// Effect id of the payment status poll; at most one runs per store
pub const PAYMENT_POLL: EffectId = EffectId::new("checkout.payment-status-poll");

/// Effect id of the order submission call
pub const CHECKOUT_SUBMISSION: EffectId = EffectId::new("checkout.submission");

/// Effect id of the guest order call
pub const GUEST_ORDER_REQUEST: EffectId = EffectId::new("checkout.guest-order");

/// Effect id of the discount code lookup
pub const DISCOUNT_LOOKUP: EffectId = EffectId::new("checkout.discount-lookup");

/// Path the buyer returns to after logging in or registering
pub const CHECKOUT_PATH: &str = "/checkout";

// ============================================================================
// Steps
// ============================================================================

/// Wizard step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CheckoutStep {
    /// Contact details
    #[default]
    OrderDetails,
    /// Payment phone and submission
    Payment,
    /// Order placed and paid
    Complete,
}

impl CheckoutStep {
    /// Every allowed `(from, to)` pair; anything else is rejected
    pub const TRANSITIONS: [(Self, Self); 3] = [
        (Self::OrderDetails, Self::Payment),
        (Self::Payment, Self::OrderDetails),
        (Self::Payment, Self::Complete),
    ];

    /// True when `(self, next)` is in [`CheckoutStep::TRANSITIONS`]
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        Self::TRANSITIONS.contains(&(self, next))
    }

    /// 1-based position shown in the progress indicator
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::OrderDetails => 1,
            Self::Payment => 2,
            Self::Complete => 3,
        }
    }

    /// Title shown in the progress indicator
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::OrderDetails => "Order details",
            Self::Payment => "Payment",
            Self::Complete => "Complete",
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ============================================================================
// State
// ============================================================================

/// Severity of a notice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Progress information
    Info,
    /// Something worked
    Success,
    /// Something failed; the buyer can retry
    Error,
}

/// Message for the buyer (rendered as a toast)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text to show
    pub message: String,
}

impl Notice {
    /// Informational notice
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Success notice
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// Error notice
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// True for error notices
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Where the host application should send the buyer next
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// Login page, then back to `return_to`
    Login {
        /// Path to return to
        return_to: String,
    },
    /// Registration page, then back to `return_to`
    Register {
        /// Path to return to
        return_to: String,
    },
    /// Event listing
    Browse,
}

impl Navigation {
    fn login() -> Self {
        Self::Login {
            return_to: CHECKOUT_PATH.to_string(),
        }
    }
}

/// Payment confirmation progress
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PaymentProgress {
    /// Nothing submitted yet, or the last attempt was abandoned
    #[default]
    Idle,
    /// Prompt sent to the phone; polling for the result
    AwaitingConfirmation {
        /// Reference being polled
        reference: CheckoutRequestId,
        /// When polling started
        started_at: DateTime<Utc>,
    },
    /// Payment confirmed
    Confirmed,
    /// Payment failed, was cancelled or could not be confirmed
    Failed {
        /// Reason shown to the buyer
        message: String,
    },
}

/// Summary shown in the success modal
#[derive(Clone, Debug, PartialEq)]
pub struct OrderConfirmation {
    /// Order created by the server
    pub order_id: Option<OrderId>,
    /// Server message for the buyer
    pub message: Option<String>,
    /// Totals charged
    pub totals: Totals,
    /// When the order completed
    pub completed_at: DateTime<Utc>,
}

/// Accepted submission waiting for payment confirmation
#[derive(Clone, Debug, PartialEq)]
struct PendingOrder {
    confirmation: CheckoutConfirmation,
    totals: Totals,
}

/// Checkout session state
///
/// Lives for one visit to the checkout page and is never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckoutState {
    /// Current step
    pub step: CheckoutStep,
    /// Buyer contact details
    pub contact: ContactDetails,
    /// Phone that receives the payment prompt, when it differs from the contact phone
    pub payment_phone: Option<String>,
    /// Applied discount
    pub discount: Option<Discount>,
    /// A discount code is being checked
    pub applying_discount: bool,
    /// Showing the login / register / guest choice
    pub auth_prompt: bool,
    /// Guest order created for an anonymous buyer
    pub guest_order_id: Option<OrderId>,
    /// Guest order request in flight
    pub creating_guest_order: bool,
    /// Checkout submission in flight
    pub submitting: bool,
    /// Payment confirmation progress
    pub payment: PaymentProgress,
    /// Set once the order completes; drives the success modal
    pub confirmation: Option<OrderConfirmation>,
    /// Latest message for the buyer
    pub notice: Option<Notice>,
    /// Pending navigation request for the host application
    pub navigation: Option<Navigation>,
    /// The checkout view is gone; every later action is ignored
    pub torn_down: bool,
    pending_order: Option<PendingOrder>,
}

impl CheckoutState {
    /// Fresh session on the order details step
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh session with contact details prefilled (e.g. from the profile)
    #[must_use]
    pub fn with_contact(contact: ContactDetails) -> Self {
        Self {
            contact,
            ..Self::default()
        }
    }

    /// Phone that will receive the payment prompt
    #[must_use]
    pub fn payment_phone(&self) -> &str {
        self.payment_phone
            .as_deref()
            .filter(|phone| !phone.trim().is_empty())
            .unwrap_or(&self.contact.phone)
    }

    /// Totals for `items` with the applied discount
    #[must_use]
    pub fn totals(&self, items: &[CartItem], tax_rate: TaxRate) -> Totals {
        Totals::compute(items, self.discount.as_ref(), tax_rate)
    }

    /// True while a payment is being confirmed
    #[must_use]
    pub const fn is_awaiting_payment(&self) -> bool {
        matches!(self.payment, PaymentProgress::AwaitingConfirmation { .. })
    }

    /// The apply button is enabled
    #[must_use]
    pub const fn can_apply_discount(&self) -> bool {
        self.discount.is_none() && !self.applying_discount
    }

    /// Moves to `next` if the transition table allows it
    fn transition(&mut self, next: CheckoutStep) -> bool {
        if self.step.can_transition_to(next) {
            tracing::debug!(from = %self.step, to = %next, "Checkout step changed");
            self.step = next;
            true
        } else {
            tracing::warn!(from = %self.step, to = %next, "Rejected checkout step change");
            self.notice = Some(Notice::error(format!(
                "You can't go to {} from {}.",
                next.title().to_lowercase(),
                self.step.title().to_lowercase()
            )));
            false
        }
    }

    fn reject(&mut self, error: &CheckoutError) {
        self.notice = Some(Notice::error(error.user_message()));
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Everything that can happen during checkout
#[derive(Clone, Debug)]
pub enum CheckoutAction {
    // User intents
    /// Edit a contact field
    UpdateContact {
        /// Field being edited
        field: ContactField,
        /// New value
        value: String,
    },
    /// Edit the phone that receives the payment prompt
    UpdatePaymentPhone {
        /// New phone number
        phone: String,
    },
    /// Continue from order details to payment
    ProceedToPayment,
    /// Return from payment to order details
    GoBack,
    /// Log in before continuing
    ChooseLogin,
    /// Register before continuing
    ChooseRegister,
    /// Check out without an account
    ContinueAsGuest,
    /// Close the login / register / guest choice
    DismissAuthPrompt,
    /// Apply a discount code
    ApplyDiscount {
        /// Code as typed
        code: String,
    },
    /// Remove the applied discount
    RemoveDiscount,
    /// Place the order
    SubmitCheckout,
    /// Stop waiting for payment confirmation
    CancelPayment,
    /// The checkout view is going away
    Teardown,
    /// The buyer closed the notice
    DismissNotice,
    /// The host application acted on `navigation`
    NavigationHandled,

    // Service results
    /// Guest order created
    GuestOrderCreated {
        /// Server response
        order: GuestOrder,
    },
    /// Guest order rejected
    GuestOrderFailed {
        /// Why
        error: CheckoutError,
    },
    /// Discount code accepted
    DiscountApplied {
        /// Discount returned by the server
        discount: Discount,
    },
    /// Discount code rejected
    DiscountRejected {
        /// Why
        error: CheckoutError,
    },
    /// Order accepted by the server
    CheckoutAccepted {
        /// Server response
        confirmation: CheckoutConfirmation,
        /// Totals that were submitted
        totals: Totals,
    },
    /// Order rejected by the server
    CheckoutRejected {
        /// Why
        error: CheckoutError,
    },
    /// Payment reached a terminal status
    PaymentSettled {
        /// Reference that was polled
        reference: CheckoutRequestId,
        /// How it ended
        outcome: PaymentOutcome,
    },
    /// Polling ended without a terminal status
    PaymentPollFailed {
        /// Reference that was polled
        reference: CheckoutRequestId,
        /// Why
        error: CheckoutError,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Checkout knobs taken from configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Tax on the discounted subtotal
    pub tax_rate: TaxRate,
    /// Payment method identifier sent with every order
    pub payment_method: String,
    /// Payment confirmation polling
    pub poll: PollConfig,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self::from(&CheckoutConfig::default())
    }
}

impl From<&CheckoutConfig> for CheckoutSettings {
    fn from(config: &CheckoutConfig) -> Self {
        Self {
            tax_rate: config.tax_rate(),
            payment_method: config.payment.method.clone(),
            poll: config.poll_config(),
        }
    }
}

/// Services the checkout reducer depends on
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Checkout backend
    pub api: Arc<dyn CheckoutApi>,
    /// The buyer's cart
    pub cart: Arc<dyn CartStore>,
    /// The buyer's session
    pub auth: Arc<dyn AuthSession>,
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Checkout settings
    pub settings: CheckoutSettings,
}

impl CheckoutEnvironment {
    /// Creates an environment with default settings
    #[must_use]
    pub fn new(
        api: Arc<dyn CheckoutApi>,
        cart: Arc<dyn CartStore>,
        auth: Arc<dyn AuthSession>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            cart,
            auth,
            clock,
            settings: CheckoutSettings::default(),
        }
    }

    /// Replaces the settings
    #[must_use]
    pub fn with_settings(mut self, settings: CheckoutSettings) -> Self {
        self.settings = settings;
        self
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the checkout wizard
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckoutReducer;

type Effects = SmallVec<[Effect<CheckoutAction>; 4]>;

impl CheckoutReducer {
    /// Creates a new `CheckoutReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn proceed_to_payment(state: &mut CheckoutState, env: &CheckoutEnvironment) -> Effects {
        if state.step != CheckoutStep::OrderDetails {
            state.transition(CheckoutStep::Payment);
            return SmallVec::new();
        }

        if let Some(field) = state.contact.first_missing() {
            state.reject(&CheckoutError::Validation {
                field: field.label().to_string(),
            });
            return SmallVec::new();
        }

        if !env.auth.is_authenticated() && state.guest_order_id.is_none() {
            state.auth_prompt = true;
            return SmallVec::new();
        }

        state.notice = None;
        state.transition(CheckoutStep::Payment);
        SmallVec::new()
    }

    fn continue_as_guest(state: &mut CheckoutState, env: &CheckoutEnvironment) -> Effects {
        // Only offered from the login / register / guest prompt
        if !state.auth_prompt || state.creating_guest_order {
            return SmallVec::new();
        }
        state.auth_prompt = false;

        if let Some(field) = state.contact.first_missing() {
            state.reject(&CheckoutError::Validation {
                field: field.label().to_string(),
            });
            return SmallVec::new();
        }

        let items = env.cart.items();
        if items.is_empty() {
            state.reject(&CheckoutError::EmptyCart);
            state.navigation = Some(Navigation::Browse);
            return SmallVec::new();
        }

        let request = GuestOrderRequest {
            guest_info: state.contact.clone(),
            items: items.iter().map(CheckoutLineItem::from).collect(),
            total: state.totals(&items, env.settings.tax_rate).total,
        };
        state.creating_guest_order = true;

        let api = Arc::clone(&env.api);
        smallvec![Effect::future(async move {
            Some(match api.create_guest_order(&request).await {
                Ok(order) => CheckoutAction::GuestOrderCreated { order },
                Err(error) => CheckoutAction::GuestOrderFailed { error },
            })
        })
        .cancellable(GUEST_ORDER_REQUEST)]
    }

    fn apply_discount(state: &mut CheckoutState, code: &str, env: &CheckoutEnvironment) -> Effects {
        if !state.can_apply_discount() {
            return SmallVec::new();
        }

        let code = code.trim().to_string();
        if code.is_empty() {
            state.reject(&CheckoutError::Validation {
                field: "Discount code".to_string(),
            });
            return SmallVec::new();
        }

        state.applying_discount = true;

        let api = Arc::clone(&env.api);
        smallvec![Effect::future(async move {
            Some(match api.apply_discount(&code).await {
                Ok(discount) => CheckoutAction::DiscountApplied { discount },
                Err(error) => CheckoutAction::DiscountRejected { error },
            })
        })
        .cancellable(DISCOUNT_LOOKUP)]
    }

    fn submit(state: &mut CheckoutState, env: &CheckoutEnvironment) -> Effects {
        if state.submitting || state.is_awaiting_payment() {
            return SmallVec::new();
        }

        let items = env.cart.items();
        if items.is_empty() {
            state.reject(&CheckoutError::EmptyCart);
            state.navigation = Some(Navigation::Browse);
            return SmallVec::new();
        }

        if state.step != CheckoutStep::Payment {
            state.notice = Some(Notice::error("Complete your order details first."));
            return SmallVec::new();
        }

        let phone = state.payment_phone().trim().to_string();
        if phone.is_empty() {
            state.reject(&CheckoutError::Validation {
                field: ContactField::Phone.label().to_string(),
            });
            return SmallVec::new();
        }

        let request = CheckoutRequest::build(
            &items,
            &state.contact,
            &env.settings.payment_method,
            &phone,
            state.discount.as_ref(),
            env.settings.tax_rate,
        )
        .for_guest_order(state.guest_order_id.clone());

        state.submitting = true;
        state.notice = None;
        state.payment = PaymentProgress::Idle;

        let api = Arc::clone(&env.api);
        smallvec![Effect::future(async move {
            let totals = request.totals;
            Some(match api.process_checkout(&request).await {
                Ok(confirmation) => CheckoutAction::CheckoutAccepted {
                    confirmation,
                    totals,
                },
                Err(error) => CheckoutAction::CheckoutRejected { error },
            })
        })
        .cancellable(CHECKOUT_SUBMISSION)]
    }

    fn accept(
        state: &mut CheckoutState,
        confirmation: CheckoutConfirmation,
        totals: Totals,
        env: &CheckoutEnvironment,
    ) -> Effects {
        state.submitting = false;

        match confirmation.checkout_request_id.clone() {
            None => Self::complete(state, confirmation, totals, env),
            Some(reference) if reference.looks_valid() => {
                tracing::info!(
                    order_id = confirmation.order_id.as_ref().map(ToString::to_string),
                    checkout_request_id = %reference,
                    "Awaiting payment confirmation"
                );
                state.payment = PaymentProgress::AwaitingConfirmation {
                    reference: reference.clone(),
                    started_at: env.clock.now(),
                };
                state.notice = Some(Notice::info(
                    "Check your phone and enter your M-Pesa PIN to complete the payment.",
                ));
                state.pending_order = Some(PendingOrder {
                    confirmation,
                    totals,
                });
                smallvec![Self::poll_effect(reference, env)]
            },
            Some(reference) => {
                tracing::warn!(checkout_request_id = %reference, "Server returned an invalid payment reference");
                state.notice = Some(Notice::error(
                    "We could not start payment confirmation. Please try again.",
                ));
                SmallVec::new()
            },
        }
    }

    fn complete(
        state: &mut CheckoutState,
        confirmation: CheckoutConfirmation,
        totals: Totals,
        env: &CheckoutEnvironment,
    ) -> Effects {
        if !state.transition(CheckoutStep::Complete) {
            return SmallVec::new();
        }

        tracing::info!(
            order_id = confirmation.order_id.as_ref().map(ToString::to_string),
            total = %totals.total,
            "Checkout complete"
        );

        state.payment = PaymentProgress::Confirmed;
        state.notice = Some(Notice::success("Your order has been placed."));
        state.confirmation = Some(OrderConfirmation {
            order_id: confirmation.order_id,
            message: confirmation.message,
            totals,
            completed_at: env.clock.now(),
        });

        let cart = Arc::clone(&env.cart);
        smallvec![Effect::future(async move {
            cart.clear();
            None
        })]
    }

    fn settle(
        state: &mut CheckoutState,
        outcome: PaymentOutcome,
        env: &CheckoutEnvironment,
    ) -> Effects {
        let pending = state.pending_order.take();

        match outcome {
            PaymentOutcome::Paid { .. } => match pending {
                Some(PendingOrder {
                    confirmation,
                    totals,
                }) => Self::complete(state, confirmation, totals, env),
                None => SmallVec::new(),
            },
            PaymentOutcome::Failed { message, .. } | PaymentOutcome::Cancelled { message } => {
                state.notice = Some(Notice::error(message.clone()));
                state.payment = PaymentProgress::Failed { message };
                SmallVec::new()
            },
        }
    }

    fn poll_failed(state: &mut CheckoutState, error: &CheckoutError) {
        state.pending_order = None;

        match error {
            CheckoutError::Cancelled => {
                state.payment = PaymentProgress::Idle;
            },
            CheckoutError::AuthExpired => {
                state.payment = PaymentProgress::Idle;
                state.reject(error);
                state.navigation = Some(Navigation::login());
            },
            other => {
                let message = other.user_message();
                state.notice = Some(Notice::error(message.clone()));
                state.payment = PaymentProgress::Failed { message };
            },
        }
    }

    /// Stops any running poll and forgets the pending payment
    fn stop_polling(state: &mut CheckoutState) -> Effect<CheckoutAction> {
        if state.is_awaiting_payment() {
            state.payment = PaymentProgress::Idle;
            state.pending_order = None;
        }
        Effect::Cancel(PAYMENT_POLL)
    }

    /// Stops every in-flight call and marks the session as gone
    fn teardown(state: &mut CheckoutState) -> Effects {
        tracing::debug!(step = %state.step, "Checkout torn down");
        state.torn_down = true;
        state.submitting = false;
        state.applying_discount = false;
        state.creating_guest_order = false;

        smallvec![
            Self::stop_polling(state),
            Effect::Cancel(CHECKOUT_SUBMISSION),
            Effect::Cancel(GUEST_ORDER_REQUEST),
            Effect::Cancel(DISCOUNT_LOOKUP),
        ]
    }

    fn poll_effect(reference: CheckoutRequestId, env: &CheckoutEnvironment) -> Effect<CheckoutAction> {
        let poller = PaymentPoller::new(Arc::clone(&env.api), env.settings.poll);

        Effect::future(async move {
            Some(match poller.poll(&reference).await {
                Ok(outcome) => CheckoutAction::PaymentSettled { reference, outcome },
                Err(error) => CheckoutAction::PaymentPollFailed { reference, error },
            })
        })
        .cancellable(PAYMENT_POLL)
    }

    /// True when `reference` is the payment currently being confirmed
    fn is_current(state: &CheckoutState, reference: &CheckoutRequestId) -> bool {
        matches!(
            &state.payment,
            PaymentProgress::AwaitingConfirmation { reference: current, .. } if current == reference
        )
    }
}

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if state.torn_down {
            tracing::trace!("Ignoring checkout action after teardown");
            return SmallVec::new();
        }

        if state.step == CheckoutStep::Complete
            && !matches!(
                action,
                CheckoutAction::DismissNotice
                    | CheckoutAction::NavigationHandled
                    | CheckoutAction::Teardown
            )
        {
            return SmallVec::new();
        }

        match action {
            // ========== Order details ==========
            CheckoutAction::UpdateContact { field, value } => {
                state.contact.set(field, value);
                SmallVec::new()
            },

            CheckoutAction::UpdatePaymentPhone { phone } => {
                state.payment_phone = Some(phone);
                SmallVec::new()
            },

            CheckoutAction::ProceedToPayment => Self::proceed_to_payment(state, env),

            CheckoutAction::GoBack => {
                if state.submitting || !state.transition(CheckoutStep::OrderDetails) {
                    return SmallVec::new();
                }
                smallvec![Self::stop_polling(state)]
            },

            // ========== Guest branch ==========
            CheckoutAction::ChooseLogin => {
                state.auth_prompt = false;
                state.navigation = Some(Navigation::login());
                SmallVec::new()
            },

            CheckoutAction::ChooseRegister => {
                state.auth_prompt = false;
                state.navigation = Some(Navigation::Register {
                    return_to: CHECKOUT_PATH.to_string(),
                });
                SmallVec::new()
            },

            CheckoutAction::DismissAuthPrompt => {
                state.auth_prompt = false;
                SmallVec::new()
            },

            CheckoutAction::ContinueAsGuest => Self::continue_as_guest(state, env),

            CheckoutAction::GuestOrderCreated { order } => {
                state.creating_guest_order = false;
                tracing::info!(
                    order_id = order.id.as_ref().map(ToString::to_string),
                    "Guest order created"
                );
                state.guest_order_id = order.id;
                state.notice = order
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .map(Notice::success);
                if state.step == CheckoutStep::OrderDetails {
                    state.transition(CheckoutStep::Payment);
                }
                SmallVec::new()
            },

            CheckoutAction::GuestOrderFailed { error } => {
                state.creating_guest_order = false;
                tracing::warn!(%error, "Guest order failed");
                state.reject(&error);
                SmallVec::new()
            },

            // ========== Discounts ==========
            CheckoutAction::ApplyDiscount { code } => Self::apply_discount(state, &code, env),

            CheckoutAction::DiscountApplied { discount } => {
                state.applying_discount = false;
                let label = if discount.description.trim().is_empty() {
                    discount.code.clone()
                } else {
                    discount.description.clone()
                };
                state.notice = Some(Notice::success(format!("Discount applied: {label}")));
                state.discount = Some(discount);
                SmallVec::new()
            },

            CheckoutAction::DiscountRejected { error } => {
                state.applying_discount = false;
                state.reject(&error);
                if error.is_auth_expired() {
                    state.navigation = Some(Navigation::login());
                }
                SmallVec::new()
            },

            CheckoutAction::RemoveDiscount => {
                if !state.submitting {
                    state.discount = None;
                }
                SmallVec::new()
            },

            // ========== Submission ==========
            CheckoutAction::SubmitCheckout => Self::submit(state, env),

            CheckoutAction::CheckoutAccepted {
                confirmation,
                totals,
            } => Self::accept(state, confirmation, totals, env),

            CheckoutAction::CheckoutRejected { error } => {
                state.submitting = false;
                tracing::warn!(%error, "Checkout rejected");
                state.reject(&error);
                if error.is_auth_expired() {
                    state.navigation = Some(Navigation::login());
                }
                SmallVec::new()
            },

            // ========== Payment confirmation ==========
            CheckoutAction::PaymentSettled { reference, outcome } => {
                if !Self::is_current(state, &reference) {
                    tracing::debug!(checkout_request_id = %reference, "Ignoring stale payment result");
                    return SmallVec::new();
                }
                Self::settle(state, outcome, env)
            },

            CheckoutAction::PaymentPollFailed { reference, error } => {
                if Self::is_current(state, &reference) {
                    Self::poll_failed(state, &error);
                }
                SmallVec::new()
            },

            CheckoutAction::CancelPayment => {
                if !state.is_awaiting_payment() {
                    return SmallVec::new();
                }
                let cancel = Self::stop_polling(state);
                state.notice = Some(Notice::info("Payment confirmation cancelled."));
                smallvec![cancel]
            },

            CheckoutAction::Teardown => Self::teardown(state),

            // ========== Housekeeping ==========
            CheckoutAction::DismissNotice => {
                state.notice = None;
                SmallVec::new()
            },

            CheckoutAction::NavigationHandled => {
                state.navigation = None;
                SmallVec::new()
            },
        }
    }
}
