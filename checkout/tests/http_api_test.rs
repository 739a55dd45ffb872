//! HTTP checkout client against a mock server

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use eventdesk_checkout::api::{CheckoutApi, CheckoutRequest, GuestOrderRequest, HttpCheckoutApi};
use eventdesk_checkout::session::{AuthenticatedUser, InMemoryAuth};
use eventdesk_checkout::types::{
    CartItem, CheckoutRequestId, ContactDetails, Money, OrderId, PaymentStatus, TaxRate,
};
use eventdesk_checkout::{CheckoutConfig, CheckoutError};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpCheckoutApi {
    let mut config = CheckoutConfig::default();
    config.api.base_url = server.uri();
    HttpCheckoutApi::new(&config).unwrap()
}

fn contact() -> ContactDetails {
    ContactDetails {
        first_name: "Amina".to_string(),
        last_name: "Otieno".to_string(),
        email: "amina@example.com".to_string(),
        phone: "254712345678".to_string(),
    }
}

fn items() -> Vec<CartItem> {
    vec![CartItem::new("evt-1", "Jazz Night", Money::from_major(50), 2)]
}

#[tokio::test]
async fn checkout_unwraps_enveloped_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/checkout/process"))
        .and(body_partial_json(json!({
            "paymentMethod": "mpesa",
            "paymentDetails": { "phoneNumber": "254712345678" },
            "totals": { "total": 108.0 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "orderId": "ord-42",
                "checkoutRequestId": "ws_CO_191220191020363925"
            },
            "message": "Payment request sent"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = CheckoutRequest::build(
        &items(),
        &contact(),
        "mpesa",
        "254712345678",
        None,
        TaxRate::STANDARD,
    );
    let confirmation = client(&server).process_checkout(&request).await.unwrap();

    assert_eq!(confirmation.order_id, Some(OrderId::new("ord-42")));
    assert!(confirmation.checkout_request_id.unwrap().looks_valid());
}

#[tokio::test]
async fn payment_status_is_read_from_reference_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/checkout/payment-status/ws_CO_191220191020363925"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "resultCode": 2006,
            "resultDesc": "Insufficient funds"
        })))
        .mount(&server)
        .await;

    let report = client(&server)
        .payment_status(&CheckoutRequestId::new("ws_CO_191220191020363925"))
        .await
        .unwrap();

    assert_eq!(report.status, PaymentStatus::Failed);
    assert_eq!(report.result_code.as_deref(), Some("2006"));
}

#[tokio::test]
async fn ids_are_sent_as_a_single_encoded_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/checkout/payment-status/ws_CO_123%2Fcancel%3Fx=1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/checkout/order/ord%201%2F2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "ord 1/2",
            "status": "pending",
            "total": 10.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server);
    let report = api
        .payment_status(&CheckoutRequestId::new("ws_CO_123/cancel?x=1"))
        .await
        .unwrap();
    let order = api.order(&OrderId::new("ord 1/2")).await.unwrap();

    assert_eq!(report.status, PaymentStatus::Pending);
    assert_eq!(order.id, OrderId::new("ord 1/2"));
}

#[tokio::test]
async fn discount_accepts_legacy_percentage_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/checkout/apply-discount"))
        .and(body_partial_json(json!({ "code": "SAVE10" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "code": "SAVE10", "discountPercentage": 10, "description": "10% off" }
        })))
        .mount(&server)
        .await;

    let discount = client(&server).apply_discount(" SAVE10 ").await.unwrap();

    assert_eq!(discount.code, "SAVE10");
    assert_eq!(discount.bps(), 1_000);
}

#[tokio::test]
async fn rejected_discount_surfaces_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/checkout/apply-discount"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "message": "Discount code has expired"
        })))
        .mount(&server)
        .await;

    let error = client(&server).apply_discount("OLD").await.unwrap_err();

    assert_eq!(
        error,
        CheckoutError::Server {
            status: Some(400),
            message: "Discount code has expired".to_string(),
        }
    );
    assert_eq!(error.user_message(), "Discount code has expired");
}

#[tokio::test]
async fn unauthorized_maps_to_auth_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/checkout/summary"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
        .mount(&server)
        .await;

    let error = client(&server).order_summary().await.unwrap_err();

    assert!(error.is_auth_expired());
}

#[tokio::test]
async fn missing_order_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/checkout/order/ord-404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let error = client(&server)
        .order(&OrderId::new("ord-404"))
        .await
        .unwrap_err();

    assert_eq!(
        error,
        CheckoutError::NotFound {
            what: "Order".to_string()
        }
    );
}

#[tokio::test]
async fn bearer_token_is_attached_when_logged_in() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/checkout/order/ord-1"))
        .and(header("authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "ord-1",
            "status": "paid",
            "total": 108.0,
            "paymentStatus": "completed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Arc::new(InMemoryAuth::logged_in(AuthenticatedUser {
        id: "usr-1".to_string(),
        name: "Amina Otieno".to_string(),
        email: "amina@example.com".to_string(),
        token: "token-123".to_string(),
    }));
    let order = client(&server)
        .with_auth(auth)
        .order(&OrderId::new("ord-1"))
        .await
        .unwrap();

    assert_eq!(order.total, Money::from_major(108));
    assert_eq!(order.payment_status, Some(PaymentStatus::Completed));
}

#[tokio::test]
async fn guest_order_with_success_false_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/guest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Email already belongs to an account"
        })))
        .mount(&server)
        .await;

    let request = GuestOrderRequest {
        guest_info: contact(),
        items: items().iter().map(Into::into).collect(),
        total: Money::from_major(108),
    };
    let error = client(&server).create_guest_order(&request).await.unwrap_err();

    assert_eq!(error.user_message(), "Email already belongs to an account");
}

#[tokio::test]
async fn guest_order_returns_bare_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders/guest"))
        .and(body_partial_json(json!({ "guestInfo": { "email": "amina@example.com" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_id": "guest-7",
            "success": true,
            "message": "Guest order created"
        })))
        .mount(&server)
        .await;

    let request = GuestOrderRequest {
        guest_info: contact(),
        items: items().iter().map(Into::into).collect(),
        total: Money::from_major(108),
    };
    let order = client(&server).create_guest_order(&request).await.unwrap();

    assert_eq!(order.id, Some(OrderId::new("guest-7")));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let mut config = CheckoutConfig::default();
    config.api.base_url = "http://127.0.0.1:1".to_string();
    let api = HttpCheckoutApi::new(&config).unwrap();

    let error = api.order_summary().await.unwrap_err();

    assert!(matches!(error, CheckoutError::Transport(_)));
    assert_eq!(error.user_message(), eventdesk_checkout::error::GENERIC_FAILURE);
}
