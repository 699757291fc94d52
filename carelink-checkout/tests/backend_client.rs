//! HTTP-level tests for the backend client

use carelink_checkout::*;
use carelink_config::CheckoutConfig;
use carelink_payments::Money;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BackendClient {
    let config = CheckoutConfig {
        api_base_url: server.uri(),
        publishable_key: "pk_test_123".into(),
        ..Default::default()
    };
    BackendClient::new(&config).unwrap()
}

fn session() -> AuthSession {
    AuthSession::new("u_42", "tok_member")
}

fn profile() -> SignupProfile {
    SignupProfile {
        first_name: "Dana".into(),
        last_name: "Reyes".into(),
        email: "dana@example.org".into(),
        phone: Some("555-0100".into()),
        password: SecretString::from("correct horse battery".to_string()),
    }
}

#[tokio::test]
async fn test_signup_returns_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/signup"))
        .and(body_partial_json(json!({
            "firstName": "Dana",
            "email": "dana@example.org"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "userId": "u_42",
            "token": "tok_member",
            "expiresAt": "2099-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server).signup(&profile()).await.unwrap();
    assert_eq!(session.user_id(), "u_42");
    assert_eq!(session.token(), "tok_member");
    assert!(session.expires_at().is_some());
}

#[tokio::test]
async fn test_signup_duplicate_email_is_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/signup"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Email already exists" })),
        )
        .mount(&server)
        .await;

    let err = client(&server).signup(&profile()).await.unwrap_err();
    assert_eq!(err, CheckoutError::Client("Email already exists".into()));
}

#[tokio::test]
async fn test_login_accepts_mongo_style_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "64f0c0ffee",
            "token": "tok_returning"
        })))
        .mount(&server)
        .await;

    let credentials = Credentials {
        email: "dana@example.org".into(),
        password: SecretString::from("correct horse battery".to_string()),
    };
    let session = client(&server).login(&credentials).await.unwrap();
    assert_eq!(session.user_id(), "64f0c0ffee");
    assert_eq!(session.expires_at(), None);
}

#[tokio::test]
async fn test_promo_validation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/promo-codes/validate"))
        .and(header("authorization", "Bearer tok_member"))
        .and(body_json(json!({ "code": "WELCOME25" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "discountPercent": 25
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/promo-codes/validate"))
        .and(body_json(json!({ "code": "NOPE" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": false,
            "message": "Promo code has expired"
        })))
        .mount(&server)
        .await;

    let backend = client(&server);
    assert_eq!(
        backend.validate("WELCOME25", &session()).await.unwrap(),
        Decimal::from(25)
    );
    assert_eq!(
        backend.validate("NOPE", &session()).await.unwrap_err(),
        CheckoutError::Validation("Promo code has expired".into())
    );
}

#[tokio::test]
async fn test_create_intent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/create-payment-intent"))
        .and(header("authorization", "Bearer tok_member"))
        .and(body_json(json!({
            "amount": 8991,
            "currency": "usd",
            "userId": "u_42"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clientSecret": "pi_3Abc_secret_xyz"
        })))
        .mount(&server)
        .await;

    let handle = client(&server)
        .create_intent(&session(), Money::usd(8991), "u_42")
        .await
        .unwrap();
    assert_eq!(handle.intent_id, "pi_3Abc");
    assert_eq!(handle.amount, Money::usd(8991));
    assert_eq!(handle.client_secret.expose(), "pi_3Abc_secret_xyz");
}

#[tokio::test]
async fn test_create_intent_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/create-payment-intent"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "jwt expired" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/payments/create-payment-intent"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let backend = client(&server);
    let first = backend
        .create_intent(&session(), Money::usd(11988), "u_42")
        .await
        .unwrap_err();
    assert_eq!(first, CheckoutError::Client("jwt expired".into()));
    assert!(!first.is_retryable());

    let second = backend
        .create_intent(&session(), Money::usd(11988), "u_42")
        .await
        .unwrap_err();
    assert_eq!(second.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn test_create_intent_preconditions_skip_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let backend = client(&server);
    let expired = session().with_expiry(Utc::now() - Duration::hours(1));
    assert!(matches!(
        backend.create_intent(&expired, Money::usd(100), "u_42").await,
        Err(CheckoutError::Client(_))
    ));
    assert!(matches!(
        backend.create_intent(&session(), Money::usd(0), "u_42").await,
        Err(CheckoutError::Validation(_))
    ));
}

#[tokio::test]
async fn test_notification_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/emails/subscription-confirmation"))
        .and(body_json(json!({ "userId": "u_42" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(
        client(&server)
            .send_subscription_confirmation(&session(), "u_42")
            .await
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_transient() {
    let config = CheckoutConfig {
        api_base_url: "http://127.0.0.1:9".into(),
        request_timeout_secs: 2,
        ..Default::default()
    };
    let backend = BackendClient::new(&config).unwrap();
    let err = assert_err!(
        backend
            .send_subscription_confirmation(&session(), "u_42")
            .await
    );
    assert!(err.is_retryable());
}
