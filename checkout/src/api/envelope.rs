//! Response envelope handling.
//!
//! The backend answers either with a bare payload or with
//! `{ "success": bool, "data": T, "message": String }`. Both shapes are
//! unwrapped here so callers only ever see `Result<T, CheckoutError>`.

use crate::error::{CheckoutError, CheckoutResult, GENERIC_FAILURE};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Unwraps an enveloped or bare JSON payload
///
/// # Errors
///
/// - [`CheckoutError::Server`] when the body says `"success": false`
/// - [`CheckoutError::Decode`] when the payload does not match `T`
pub fn unwrap_envelope<T: DeserializeOwned>(body: Value) -> CheckoutResult<T> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(CheckoutError::server(
            message_of(&body).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        ));
    }

    let payload = match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            _ => Value::Object(map),
        },
        other => other,
    };

    serde_json::from_value(payload).map_err(|e| CheckoutError::Decode(e.to_string()))
}

/// Extracts a human-readable message from an error or envelope body
#[must_use]
pub fn message_of(body: &Value) -> Option<String> {
    ["message", "error", "msg"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::GuestOrder;
    use crate::types::Discount;
    use serde_json::json;

    #[test]
    fn enveloped_payload_is_unwrapped() {
        let discount: Discount = unwrap_envelope(json!({
            "success": true,
            "data": { "code": "EARLY", "discountPercentage": 20, "description": "Early bird" }
        }))
        .unwrap();

        assert_eq!(discount.code, "EARLY");
        assert!((discount.percentage - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bare_payload_is_accepted() {
        let order: GuestOrder = unwrap_envelope(json!({
            "_id": "ord-9", "success": true, "message": "Guest order created"
        }))
        .unwrap();

        assert_eq!(order.id.unwrap().as_str(), "ord-9");
        assert_eq!(order.message.as_deref(), Some("Guest order created"));
    }

    #[test]
    fn success_false_surfaces_message_verbatim() {
        let result: CheckoutResult<GuestOrder> = unwrap_envelope(json!({
            "success": false, "message": "Email already belongs to an account"
        }));

        assert_eq!(
            result.unwrap_err(),
            CheckoutError::server("Email already belongs to an account")
        );
    }

    #[test]
    fn success_false_without_message_uses_fallback() {
        let result: CheckoutResult<GuestOrder> = unwrap_envelope(json!({ "success": false }));
        assert_eq!(result.unwrap_err().user_message(), GENERIC_FAILURE);
    }

    #[test]
    fn mismatched_payload_is_a_decode_error() {
        let result: CheckoutResult<Discount> = unwrap_envelope(json!({ "data": [1, 2, 3] }));
        assert!(matches!(result, Err(CheckoutError::Decode(_))));
    }
}
