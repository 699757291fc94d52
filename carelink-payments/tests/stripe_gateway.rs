//! HTTP-level tests for the Stripe gateway

use carelink_payments::*;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gateway(server: &MockServer) -> StripeGateway {
    StripeGateway::with_base_url(server.uri(), "pk_test_123", Duration::from_secs(5)).unwrap()
}

fn card_request() -> CreatePaymentMethodRequest {
    CreatePaymentMethodRequest {
        card: CardDetails {
            number: "4242424242424242".into(),
            exp_month: 12,
            exp_year: 2030,
            cvc: "123".into(),
        },
        billing_details: BillingDetails {
            name: Some("Dana Reyes".into()),
            email: Some("dana@example.org".into()),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_create_payment_method() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_methods"))
        .and(header("authorization", "Bearer pk_test_123"))
        .and(header_exists("idempotency-key"))
        .and(body_string_contains("type=card"))
        .and(body_string_contains("billing_details%5Bemail%5D=dana%40example.org"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pm_card_1",
            "type": "card"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = gateway(&server)
        .await
        .create_payment_method(card_request())
        .await
        .unwrap();
    assert_eq!(token, PaymentMethodToken("pm_card_1".into()));
}

#[tokio::test]
async fn test_create_payment_method_invalid_number() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_methods"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "type": "card_error",
                "code": "incorrect_number",
                "message": "Your card number is incorrect."
            }
        })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .await
        .create_payment_method(card_request())
        .await
        .unwrap_err();
    assert_eq!(err, PaymentError::InvalidCard("Your card number is incorrect.".into()));
    assert!(err.is_card_error());
}

#[tokio::test]
async fn test_confirm_intent_succeeded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_intents/pi_42/confirm"))
        .and(body_string_contains("payment_method=pm_card_1"))
        .and(body_string_contains("client_secret=pi_42_secret_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_42",
            "amount": 8991,
            "currency": "usd",
            "status": "succeeded",
            "client_secret": "pi_42_secret_abc"
        })))
        .mount(&server)
        .await;

    let intent = gateway(&server)
        .await
        .confirm_intent(
            &ClientSecret::new("pi_42_secret_abc"),
            &PaymentMethodToken("pm_card_1".into()),
        )
        .await
        .unwrap();

    assert_eq!(intent.id, "pi_42");
    assert_eq!(intent.status, IntentStatus::Succeeded);
    assert_eq!(intent.amount, Money::usd(8991));
}

#[tokio::test]
async fn test_confirm_intent_declined() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_intents/pi_42/confirm"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "decline_code": "insufficient_funds",
                "message": "Your card has insufficient funds."
            }
        })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .await
        .confirm_intent(
            &ClientSecret::new("pi_42_secret_abc"),
            &PaymentMethodToken("pm_card_1".into()),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PaymentError::CardDeclined {
            code: DeclineCode::InsufficientFunds,
            ..
        }
    ));
}

#[tokio::test]
async fn test_retrieve_intent_passes_client_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payment_intents/pi_7"))
        .and(query_param("client_secret", "pi_7_secret_zz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_7",
            "amount": 11988,
            "currency": "usd",
            "status": "requires_payment_method",
            "last_payment_error": {
                "type": "card_error",
                "code": "card_declined",
                "decline_code": "generic_decline",
                "message": "Your card was declined."
            }
        })))
        .mount(&server)
        .await;

    let intent = gateway(&server)
        .await
        .retrieve_intent(&ClientSecret::new("pi_7_secret_zz"))
        .await
        .unwrap();

    assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
    assert_eq!(intent.last_error.as_deref(), Some("Your card was declined."));
    assert_eq!(intent.last_decline_code.as_deref(), Some("generic_decline"));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payment_intents/pi_7"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .await
        .retrieve_intent(&ClientSecret::new("pi_7_secret_zz"))
        .await
        .unwrap_err();

    assert!(err.is_transient());
}
