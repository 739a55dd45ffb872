//! HTTP client for the checkout backend

use super::envelope::{message_of, unwrap_envelope};
use super::{
    CheckoutApi, CheckoutConfirmation, CheckoutRequest, GuestOrder, GuestOrderRequest,
    OrderDetails, OrderSummary,
};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};
use crate::session::AuthSession;
use crate::types::{CheckoutRequestId, Discount, OrderId, PaymentStatusReport};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Checkout API over HTTP
#[derive(Clone)]
pub struct HttpCheckoutApi {
    client: Client,
    base_url: String,
    guest_order_path: String,
    auth: Option<Arc<dyn AuthSession>>,
}

impl HttpCheckoutApi {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &CheckoutConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CheckoutError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            guest_order_path: config.api.guest_order_path.clone(),
            auth: None,
        })
    }

    /// Attach bearer tokens from an auth session to every request
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthSession>) -> Self {
        self.auth = Some(auth);
        self
    }

    fn url(&self, path: &str) -> CheckoutResult<Url> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| CheckoutError::Config(format!("invalid API URL {}: {e}", self.base_url)))
    }

    /// `path` followed by `id` as a single percent-encoded segment
    fn url_with_id(&self, path: &str, id: &str) -> CheckoutResult<Url> {
        let mut url = self.url(path)?;
        url.path_segments_mut()
            .map_err(|()| {
                CheckoutError::Config(format!("API URL cannot have a path: {}", self.base_url))
            })?
            .push(id);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.as_ref().and_then(|auth| auth.bearer_token()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, what: &str) -> CheckoutResult<T> {
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await?;

        Self::decode(response, what).await
    }

    async fn post<B, T>(&self, path: &str, body: &B, what: &str) -> CheckoutResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .authorize(self.client.post(self.url(path)?))
            .json(body)
            .send()
            .await?;

        Self::decode(response, what).await
    }

    /// Maps status codes onto [`CheckoutError`] and unwraps the envelope
    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> CheckoutResult<T> {
        let status = response.status();

        if status.is_success() {
            let body: Value = response.json().await?;
            return unwrap_envelope(body);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .as_ref()
            .and_then(message_of);

        tracing::warn!(
            status = status.as_u16(),
            what,
            message = message.as_deref().unwrap_or(""),
            "Checkout API returned an error"
        );

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CheckoutError::AuthExpired),
            StatusCode::NOT_FOUND => Err(CheckoutError::NotFound {
                what: what.to_string(),
            }),
            status => Err(CheckoutError::Server {
                status: Some(status.as_u16()),
                message: message.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl CheckoutApi for HttpCheckoutApi {
    async fn process_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> CheckoutResult<CheckoutConfirmation> {
        tracing::info!(items = request.items.len(), total = %request.totals.total, "Submitting checkout");
        self.post("/checkout/process", request, "Checkout").await
    }

    async fn payment_status(
        &self,
        reference: &CheckoutRequestId,
    ) -> CheckoutResult<PaymentStatusReport> {
        let url = self.url_with_id("/checkout/payment-status", reference.as_str())?;
        self.get(url, "Payment request").await
    }

    async fn apply_discount(&self, code: &str) -> CheckoutResult<Discount> {
        self.post(
            "/checkout/apply-discount",
            &serde_json::json!({ "code": code.trim() }),
            "Discount code",
        )
        .await
    }

    async fn order_summary(&self) -> CheckoutResult<OrderSummary> {
        self.get(self.url("/checkout/summary")?, "Order summary").await
    }

    async fn order(&self, order_id: &OrderId) -> CheckoutResult<OrderDetails> {
        let url = self.url_with_id("/checkout/order", order_id.as_str())?;
        self.get(url, "Order").await
    }

    async fn create_guest_order(&self, request: &GuestOrderRequest) -> CheckoutResult<GuestOrder> {
        self.post(&self.guest_order_path, request, "Guest order").await
    }
}
