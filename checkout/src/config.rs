//! Configuration for the checkout client.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::polling::PollConfig;
use crate::types::TaxRate;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Checkout client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Backend API configuration
    pub api: ApiConfig,
    /// Payment configuration
    pub payment: PaymentConfig,
    /// Pricing configuration
    pub pricing: PricingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the ticketing API, without trailing slash
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Path of the guest order endpoint
    pub guest_order_path: String,
}

/// Payment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Payment method identifier sent with every checkout
    pub method: String,
    /// Delay between payment status polls in milliseconds (default: 2000)
    pub poll_interval_ms: u64,
    /// Maximum number of status polls (default: 60)
    pub poll_max_attempts: u32,
}

/// Pricing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Tax rate in basis points (default: 800)
    pub tax_rate_bps: u32,
    /// Currency code used when formatting prices
    pub currency: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:5000/api".to_string(),
                request_timeout_secs: 30,
                guest_order_path: "/orders/guest".to_string(),
            },
            payment: PaymentConfig {
                method: "mpesa".to_string(),
                poll_interval_ms: 2_000,
                poll_max_attempts: 60,
            },
            pricing: PricingConfig {
                tax_rate_bps: TaxRate::STANDARD.bps(),
                currency: "KES".to_string(),
            },
        }
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            api: ApiConfig {
                base_url: lookup("EVENTDESK_API_URL")
                    .map_or(defaults.api.base_url, |url| url.trim_end_matches('/').to_string()),
                request_timeout_secs: parse_nonzero(
                    lookup("EVENTDESK_REQUEST_TIMEOUT_SECS"),
                    defaults.api.request_timeout_secs,
                ),
                guest_order_path: lookup("EVENTDESK_GUEST_ORDER_PATH")
                    .unwrap_or(defaults.api.guest_order_path),
            },
            payment: PaymentConfig {
                method: lookup("EVENTDESK_PAYMENT_METHOD").unwrap_or(defaults.payment.method),
                poll_interval_ms: parse_nonzero(
                    lookup("EVENTDESK_POLL_INTERVAL_MS"),
                    defaults.payment.poll_interval_ms,
                ),
                poll_max_attempts: parse_nonzero(
                    lookup("EVENTDESK_POLL_MAX_ATTEMPTS"),
                    defaults.payment.poll_max_attempts,
                ),
            },
            pricing: PricingConfig {
                tax_rate_bps: parse_or(
                    lookup("EVENTDESK_TAX_RATE_BPS"),
                    defaults.pricing.tax_rate_bps,
                ),
                currency: lookup("EVENTDESK_CURRENCY").unwrap_or(defaults.pricing.currency),
            },
        }
    }

    /// Request timeout as a `Duration`
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Polling parameters
    #[must_use]
    pub const fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.payment.poll_interval_ms),
            max_attempts: self.payment.poll_max_attempts,
        }
    }

    /// Configured tax rate
    #[must_use]
    pub const fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.pricing.tax_rate_bps)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Like [`parse_or`], but zero also falls back to `default`
fn parse_nonzero<T: FromStr + Default + PartialEq>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .filter(|v: &T| *v != T::default())
        .unwrap_or(default)
}
