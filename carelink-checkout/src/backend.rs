//! HTTP client for the carelink backend API

use async_trait::async_trait;
use carelink_config::{CheckoutConfig, Endpoints};
use carelink_log::{debug, info};
use carelink_payments::{ClientSecret, Currency, Money};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

use crate::error::{CheckoutError, CheckoutResult};
use crate::services::{
    AccountService, Credentials, IntentHandle, IntentService, Notifier, PromoService,
    SignupProfile, check_intent_request,
};
use crate::session::AuthSession;

/// JSON client for the account, promo, intent and email endpoints.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    endpoints: Endpoints,
    currency: Currency,
}

impl BackendClient {
    pub fn new(config: &CheckoutConfig) -> CheckoutResult<Self> {
        let currency = Currency::from_code(&config.currency).ok_or_else(|| {
            CheckoutError::Validation(format!("unsupported currency: {}", config.currency))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("carelink-checkout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CheckoutError::Validation(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
            currency,
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        session: Option<&AuthSession>,
        body: Value,
    ) -> CheckoutResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(session) = session {
            request = request.bearer_auth(session.token());
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("POST {} -> {}", path, status.as_u16());

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), error_message(&text)));
        }

        // Some endpoints answer 2xx with an empty body.
        let text = response.text().await?;
        let text = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str(text)
            .map_err(|e| CheckoutError::Payment(format!("unexpected response from {}: {}", path, e)))
    }
}

/// Map a failed response onto the checkout taxonomy.
fn classify(status: u16, message: String) -> CheckoutError {
    match status {
        408 | 429 | 500..=599 => CheckoutError::Transient(format!("{} ({})", message, status)),
        _ => CheckoutError::Client(message),
    }
}

/// Pull `message` or `error` out of a JSON error body, falling back to raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    #[serde(alias = "_id", alias = "id")]
    user_id: String,
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl From<AuthResponse> for AuthSession {
    fn from(resp: AuthResponse) -> Self {
        let session = AuthSession::new(resp.user_id, resp.token);
        match resp.expires_at {
            Some(at) => session.with_expiry(at),
            None => session,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromoResponse {
    valid: bool,
    #[serde(default)]
    discount_percent: Decimal,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntentResponse {
    client_secret: String,
    #[serde(alias = "id")]
    payment_intent_id: Option<String>,
}

#[async_trait]
impl AccountService for BackendClient {
    async fn signup(&self, profile: &SignupProfile) -> CheckoutResult<AuthSession> {
        profile.validate()?;
        let body = json!({
            "firstName": profile.first_name,
            "lastName": profile.last_name,
            "email": profile.email,
            "phone": profile.phone,
            "password": profile.password.expose_secret(),
        });
        let resp: AuthResponse = self.post(&self.endpoints.signup, None, body).await?;
        info!("signed up member {}", resp.user_id);
        Ok(resp.into())
    }

    async fn login(&self, credentials: &Credentials) -> CheckoutResult<AuthSession> {
        let body = json!({
            "email": credentials.email,
            "password": credentials.password.expose_secret(),
        });
        let resp: AuthResponse = self.post(&self.endpoints.login, None, body).await?;
        info!("member {} logged in", resp.user_id);
        Ok(resp.into())
    }
}

#[async_trait]
impl PromoService for BackendClient {
    async fn validate(&self, code: &str, session: &AuthSession) -> CheckoutResult<Decimal> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CheckoutError::Validation("promo code is empty".into()));
        }
        session.ensure_usable()?;

        let resp: PromoResponse = self
            .post(
                &self.endpoints.promo_validate,
                Some(session),
                json!({ "code": code }),
            )
            .await?;

        if !resp.valid {
            return Err(CheckoutError::Validation(
                resp.message
                    .unwrap_or_else(|| format!("promo code {} is not valid", code)),
            ));
        }
        Ok(resp.discount_percent)
    }
}

#[async_trait]
impl IntentService for BackendClient {
    async fn create_intent(
        &self,
        session: &AuthSession,
        amount: Money,
        subject_user_id: &str,
    ) -> CheckoutResult<IntentHandle> {
        check_intent_request(session, &amount)?;
        if amount.currency != self.currency {
            return Err(CheckoutError::Validation(format!(
                "amount currency {} does not match configured {}",
                amount.currency, self.currency
            )));
        }

        let body = json!({
            "amount": amount.amount,
            "currency": amount.currency.code().to_lowercase(),
            "userId": subject_user_id,
        });
        let resp: IntentResponse = self
            .post(&self.endpoints.create_intent, Some(session), body)
            .await?;

        let client_secret = ClientSecret::new(resp.client_secret);
        let intent_id = match resp.payment_intent_id {
            Some(id) => id,
            None => client_secret
                .intent_id()
                .map(str::to_string)
                .ok_or_else(|| CheckoutError::Payment("malformed client secret".into()))?,
        };

        debug!("created intent {} for {}", intent_id, amount);
        Ok(IntentHandle {
            intent_id,
            client_secret,
            amount,
        })
    }
}

#[async_trait]
impl Notifier for BackendClient {
    async fn send_subscription_confirmation(
        &self,
        session: &AuthSession,
        user_id: &str,
    ) -> CheckoutResult<()> {
        let _: Value = self
            .post(
                &self.endpoints.subscription_email,
                Some(session),
                json!({ "userId": user_id }),
            )
            .await?;
        Ok(())
    }
}
