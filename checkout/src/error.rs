//! Error type shared by every checkout service call.
//!
//! Services either return a payload or one of these; the wizard turns them
//! into notices. Nothing here is fatal to a session.

use crate::types::PaymentStatus;
use thiserror::Error;

/// Result alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Message shown when the server gives no usable reason
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Errors surfaced by checkout services
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckoutError {
    /// Session expired or missing; the buyer must log in again
    #[error("Your session has expired. Please log in again.")]
    AuthExpired,

    /// Requested resource does not exist
    #[error("{what} not found")]
    NotFound {
        /// What was looked up
        what: String,
    },

    /// A required field is empty
    #[error("{field} is required")]
    Validation {
        /// Label of the missing field
        field: String,
    },

    /// Checkout attempted with nothing in the cart
    #[error("Your cart is empty")]
    EmptyCart,

    /// Server rejected the request; `message` is passed through verbatim
    #[error("{message}")]
    Server {
        /// HTTP status when known
        status: Option<u16>,
        /// Server-provided message
        message: String,
    },

    /// Payment status polling ran out of attempts
    #[error(
        "We could not confirm your payment in time (last status: {last_status}). \
         If you approved it on your phone, check your orders before trying again."
    )]
    PaymentTimeout {
        /// Number of polls made
        attempts: u32,
        /// Last status the server reported
        last_status: PaymentStatus,
    },

    /// Operation was cancelled by its owner
    #[error("Operation cancelled")]
    Cancelled,

    /// Network or transport failure
    #[error("Request failed: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("Response parsing failed: {0}")]
    Decode(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CheckoutError {
    /// Server error with only a message
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            status: None,
            message: message.into(),
        }
    }

    /// Text to show the buyer
    ///
    /// Transport and decoding details stay in logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) | Self::Decode(_) | Self::Config(_) => GENERIC_FAILURE.to_string(),
            Self::Server { message, .. } if message.trim().is_empty() => {
                GENERIC_FAILURE.to_string()
            },
            other => other.to_string(),
        }
    }

    /// True when the buyer has to log in again
    #[must_use]
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }

    /// True when polling ran out of attempts
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::PaymentTimeout { .. })
    }
}

impl From<reqwest::Error> for CheckoutError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_messages_pass_through_verbatim() {
        let error = CheckoutError::server("Tickets for this event are sold out");
        assert_eq!(error.user_message(), "Tickets for this event are sold out");
    }

    #[test]
    fn transport_details_are_hidden_from_buyers() {
        let error = CheckoutError::Transport("connection reset by peer".to_string());
        assert_eq!(error.user_message(), GENERIC_FAILURE);
        assert!(error.to_string().contains("connection reset"));
    }

    #[test]
    fn blank_server_message_falls_back() {
        assert_eq!(CheckoutError::server("  ").user_message(), GENERIC_FAILURE);
    }

    #[test]
    fn timeout_mentions_last_status() {
        let error = CheckoutError::PaymentTimeout {
            attempts: 60,
            last_status: PaymentStatus::Processing,
        };
        assert!(error.is_timeout());
        assert!(error.user_message().contains("processing"));
    }

    #[test]
    fn validation_names_the_field() {
        let error = CheckoutError::Validation {
            field: "Email".to_string(),
        };
        assert_eq!(error.user_message(), "Email is required");
    }
}
