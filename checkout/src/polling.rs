//! Payment status polling.
//!
//! Mobile-money payments are confirmed out of band: the provider calls the
//! backend, and the client polls the backend until the payment reaches a
//! terminal status or the attempt budget runs out.
//!
//! ```text
//! t = 1·interval  poll #1  pending     → keep going
//! t = 2·interval  poll #2  processing  → keep going
//! t = 3·interval  poll #3  completed   → Paid
//! ...
//! poll #max_attempts still not terminal → PaymentTimeout
//! ```

use crate::api::CheckoutApi;
use crate::error::{CheckoutError, CheckoutResult};
use crate::types::{CheckoutRequestId, PaymentOutcome, PaymentStatus, PaymentStatusReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Provider result code for a declined payment due to low balance
pub const INSUFFICIENT_FUNDS_CODE: &str = "2006";

/// Message shown for [`INSUFFICIENT_FUNDS_CODE`]
pub const INSUFFICIENT_FUNDS_MESSAGE: &str =
    "Payment failed: insufficient funds in your M-Pesa account. Top up and try again.";

/// Message shown when a failed payment carries no description
pub const PAYMENT_FAILED_MESSAGE: &str = "Payment failed. Please try again.";

/// Message shown when the buyer cancels on their phone
pub const PAYMENT_CANCELLED_MESSAGE: &str = "You cancelled the payment request on your phone.";

/// Shortest period used between polls; `interval_at` panics on zero
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Polling parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between polls; the first poll happens one interval after start.
    /// Values below [`MIN_POLL_INTERVAL`] are raised to it.
    pub interval: Duration,
    /// Maximum number of polls
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2_000),
            max_attempts: 60,
        }
    }
}

/// Classifies a status report
///
/// Returns `None` while the payment is still in flight (`pending`,
/// `processing` or any status this client does not know).
#[must_use]
pub fn interpret(report: &PaymentStatusReport) -> Option<PaymentOutcome> {
    match &report.status {
        PaymentStatus::Completed => Some(PaymentOutcome::Paid {
            report: report.clone(),
        }),
        PaymentStatus::Failed => {
            let message = if report.result_code.as_deref() == Some(INSUFFICIENT_FUNDS_CODE) {
                INSUFFICIENT_FUNDS_MESSAGE.to_string()
            } else {
                report
                    .result_desc
                    .clone()
                    .filter(|desc| !desc.trim().is_empty())
                    .unwrap_or_else(|| PAYMENT_FAILED_MESSAGE.to_string())
            };
            Some(PaymentOutcome::Failed {
                result_code: report.result_code.clone(),
                message,
            })
        },
        PaymentStatus::Cancelled => Some(PaymentOutcome::Cancelled {
            message: PAYMENT_CANCELLED_MESSAGE.to_string(),
        }),
        PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Unknown(_) => None,
    }
}

/// Polls until the payment settles, attempts run out, or `cancel` fires
///
/// Transport errors use up an attempt and polling continues; an expired
/// session ends polling at once since retrying cannot succeed.
///
/// # Errors
///
/// - [`CheckoutError::PaymentTimeout`] after `max_attempts` non-terminal polls
/// - [`CheckoutError::Cancelled`] when `cancel` fires
/// - [`CheckoutError::AuthExpired`] when the backend rejects the session
pub async fn poll_payment_status(
    api: &dyn CheckoutApi,
    reference: &CheckoutRequestId,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> CheckoutResult<PaymentOutcome> {
    if !reference.looks_valid() {
        tracing::warn!(checkout_request_id = %reference, "Polling an unexpected checkout request id");
    }

    let period = config.interval.max(MIN_POLL_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_status = PaymentStatus::Pending;

    for attempt in 1..=config.max_attempts {
        tokio::select! {
            () = cancel.cancelled() => return Err(CheckoutError::Cancelled),
            _ = ticker.tick() => {},
        }

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(CheckoutError::Cancelled),
            response = api.payment_status(reference) => response,
        };

        match response {
            Ok(report) => {
                tracing::debug!(
                    checkout_request_id = %reference,
                    attempt,
                    status = %report.status,
                    "Payment status polled"
                );
                if let Some(outcome) = interpret(&report) {
                    tracing::info!(
                        checkout_request_id = %reference,
                        attempt,
                        status = %report.status,
                        "Payment settled"
                    );
                    return Ok(outcome);
                }
                last_status = report.status;
            },
            Err(CheckoutError::AuthExpired) => return Err(CheckoutError::AuthExpired),
            Err(error) => {
                tracing::warn!(
                    checkout_request_id = %reference,
                    attempt,
                    %error,
                    "Payment status poll failed"
                );
            },
        }
    }

    tracing::warn!(
        checkout_request_id = %reference,
        attempts = config.max_attempts,
        last_status = %last_status,
        "Payment status polling timed out"
    );

    Err(CheckoutError::PaymentTimeout {
        attempts: config.max_attempts,
        last_status,
    })
}

/// Runs payment status polls against a checkout backend
#[derive(Clone)]
pub struct PaymentPoller {
    api: Arc<dyn CheckoutApi>,
    config: PollConfig,
}

impl PaymentPoller {
    /// Creates a poller
    #[must_use]
    pub fn new(api: Arc<dyn CheckoutApi>, config: PollConfig) -> Self {
        Self { api, config }
    }

    /// Polling parameters
    #[must_use]
    pub const fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Polls in the current task until settled or timed out
    ///
    /// Dropping the returned future stops polling.
    ///
    /// # Errors
    ///
    /// See [`poll_payment_status`].
    pub async fn poll(&self, reference: &CheckoutRequestId) -> CheckoutResult<PaymentOutcome> {
        poll_payment_status(
            self.api.as_ref(),
            reference,
            &self.config,
            &CancellationToken::new(),
        )
        .await
    }

    /// Polls in a background task
    ///
    /// The returned handle cancels polling when dropped, so the owner's
    /// scope bounds the lifetime of the timer.
    #[must_use]
    pub fn spawn(&self, reference: CheckoutRequestId) -> PollHandle {
        let token = CancellationToken::new();
        let api = Arc::clone(&self.api);
        let config = self.config;
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            poll_payment_status(api.as_ref(), &reference, &config, &task_token).await
        });

        PollHandle { token, task }
    }
}

/// Handle to a background poll; dropping it cancels the poll
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<CheckoutResult<PaymentOutcome>>,
}

impl PollHandle {
    /// Stop polling; [`PollHandle::outcome`] then yields `Cancelled`
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once polling has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for polling to end
    ///
    /// # Errors
    ///
    /// See [`poll_payment_status`]; a panicked or aborted task reports
    /// [`CheckoutError::Cancelled`].
    pub async fn outcome(&mut self) -> CheckoutResult<PaymentOutcome> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(%error, "Payment polling task ended abnormally");
                Err(CheckoutError::Cancelled)
            },
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
