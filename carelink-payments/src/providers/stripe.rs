//! Stripe gateway, client-side surface
//!
//! Speaks the subset of the Stripe REST API that a browser integration uses
//! with the publishable key: tokenizing cards and confirming or retrieving a
//! payment intent through its client secret.

use crate::{
    error::{DeclineCode, PaymentError, PaymentResult},
    gateway::{PaymentGateway, ProviderClient},
    money::{Currency, Money},
    types::*,
};
use async_trait::async_trait;
use carelink_log::debug;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

/// Default Stripe API root.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe gateway
pub struct StripeGateway {
    client: ProviderClient,
}

impl StripeGateway {
    /// Create a gateway against the public Stripe API
    pub fn new(publishable_key: impl Into<String>) -> PaymentResult<Self> {
        Self::with_base_url(STRIPE_API_BASE, publishable_key, Duration::from_secs(30))
    }

    /// Create a gateway against a custom base URL (proxies, test servers)
    pub fn with_base_url(
        base_url: impl Into<String>,
        publishable_key: impl Into<String>,
        timeout: Duration,
    ) -> PaymentResult<Self> {
        Ok(Self {
            client: ProviderClient::new(base_url, publishable_key, timeout)?,
        })
    }

    fn intent_path(client_secret: &ClientSecret, suffix: &str) -> PaymentResult<String> {
        let id = client_secret
            .intent_id()
            .ok_or_else(|| PaymentError::Validation("malformed client secret".into()))?;
        Ok(format!("/payment_intents/{}{}", id, suffix))
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> PaymentResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match serde_json::from_str::<StripeError>(&body) {
        Ok(err) => err.error.into_payment_error(status.as_u16()),
        Err(_) => PaymentError::from_status(status.as_u16(), body),
    })
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_payment_method(
        &self,
        request: CreatePaymentMethodRequest,
    ) -> PaymentResult<PaymentMethodToken> {
        let mut params = HashMap::new();
        params.insert("type", "card".to_string());
        params.insert("card[number]", request.card.number.clone());
        params.insert("card[exp_month]", request.card.exp_month.to_string());
        params.insert("card[exp_year]", request.card.exp_year.to_string());
        params.insert("card[cvc]", request.card.cvc.clone());

        let billing = &request.billing_details;
        if let Some(name) = &billing.name {
            params.insert("billing_details[name]", name.clone());
        }
        if let Some(email) = &billing.email {
            params.insert("billing_details[email]", email.clone());
        }
        if let Some(phone) = &billing.phone {
            params.insert("billing_details[phone]", phone.clone());
        }
        if let Some(address) = &billing.address {
            if let Some(postal_code) = &address.postal_code {
                params.insert("billing_details[address][postal_code]", postal_code.clone());
            }
            if let Some(country) = &address.country {
                params.insert("billing_details[address][country]", country.clone());
            }
        }

        let response = self.client.post_form("/payment_methods", &params).await?;
        let method: StripePaymentMethod = read_json(response).await?;
        debug!("created payment method {}", method.id);
        Ok(PaymentMethodToken(method.id))
    }

    async fn confirm_intent(
        &self,
        client_secret: &ClientSecret,
        payment_method: &PaymentMethodToken,
    ) -> PaymentResult<PaymentIntent> {
        let mut params = HashMap::new();
        params.insert("client_secret", client_secret.expose().to_string());
        params.insert("payment_method", payment_method.as_str().to_string());

        let path = Self::intent_path(client_secret, "/confirm")?;
        let response = self.client.post_form(&path, &params).await?;
        let intent: StripePaymentIntent = read_json(response).await?;
        Ok(intent.into())
    }

    async fn retrieve_intent(&self, client_secret: &ClientSecret) -> PaymentResult<PaymentIntent> {
        let path = Self::intent_path(client_secret, "")?;
        let response = self
            .client
            .get(&path, &[("client_secret", client_secret.expose())])
            .await?;
        let intent: StripePaymentIntent = read_json(response).await?;
        Ok(intent.into())
    }
}

// Stripe API types

#[derive(Debug, Deserialize)]
struct StripeError {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
    decline_code: Option<String>,
}

impl StripeErrorDetail {
    fn into_payment_error(self, status: u16) -> PaymentError {
        if self.error_type.as_deref() != Some("card_error") {
            return PaymentError::from_status(status, self.message);
        }

        match self.code.as_deref() {
            Some("expired_card") => PaymentError::CardExpired,
            Some(
                "incorrect_number" | "invalid_number" | "invalid_expiry_month"
                | "invalid_expiry_year" | "invalid_cvc" | "incorrect_cvc",
            ) => PaymentError::InvalidCard(self.message),
            code => PaymentError::CardDeclined {
                code: DeclineCode::parse(
                    self.decline_code.as_deref().or(code).unwrap_or_default(),
                ),
                message: self.message,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripePaymentMethod {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    client_secret: Option<String>,
    next_action: Option<StripeNextAction>,
    last_payment_error: Option<StripeErrorDetail>,
    created: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeNextAction {
    #[serde(rename = "type")]
    action_type: String,
    redirect_to_url: Option<StripeRedirect>,
}

#[derive(Debug, Deserialize)]
struct StripeRedirect {
    url: Option<String>,
}

impl From<StripePaymentIntent> for PaymentIntent {
    fn from(spi: StripePaymentIntent) -> Self {
        let currency = Currency::from_code(&spi.currency).unwrap_or_default();
        let (last_error, last_decline_code) = match spi.last_payment_error {
            Some(err) => (Some(err.message), err.decline_code.or(err.code)),
            None => (None, None),
        };

        Self {
            id: spi.id,
            client_secret: spi.client_secret.map(ClientSecret::new),
            amount: Money::new(spi.amount, currency),
            status: IntentStatus::parse(&spi.status),
            next_action: spi.next_action.map(|action| NextAction {
                kind: action.action_type,
                redirect_url: action.redirect_to_url.and_then(|r| r.url),
            }),
            last_error,
            last_decline_code,
            created_at: spi.created.and_then(|t| Utc.timestamp_opt(t, 0).single()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_error(code: &str, decline: Option<&str>) -> StripeErrorDetail {
        StripeErrorDetail {
            message: "Your card was declined.".into(),
            error_type: Some("card_error".into()),
            code: Some(code.into()),
            decline_code: decline.map(Into::into),
        }
    }

    #[test]
    fn test_card_error_mapping() {
        assert!(matches!(
            card_error("card_declined", Some("insufficient_funds")).into_payment_error(402),
            PaymentError::CardDeclined { code: DeclineCode::InsufficientFunds, .. }
        ));
        assert_eq!(
            card_error("expired_card", None).into_payment_error(402),
            PaymentError::CardExpired
        );
        assert!(matches!(
            card_error("incorrect_number", None).into_payment_error(402),
            PaymentError::InvalidCard(_)
        ));
    }

    #[test]
    fn test_non_card_error_uses_status() {
        let detail = StripeErrorDetail {
            message: "Invalid API Key provided".into(),
            error_type: Some("invalid_request_error".into()),
            code: None,
            decline_code: None,
        };
        assert!(matches!(
            detail.into_payment_error(401),
            PaymentError::Authentication(_)
        ));
    }

    #[test]
    fn test_intent_conversion() {
        let raw = serde_json::json!({
            "id": "pi_1",
            "amount": 8991,
            "currency": "usd",
            "status": "requires_action",
            "client_secret": "pi_1_secret_x",
            "next_action": {
                "type": "redirect_to_url",
                "redirect_to_url": { "url": "https://hooks.stripe.com/3ds" }
            },
            "last_payment_error": null,
            "created": 1_700_000_000
        });
        let intent: PaymentIntent = serde_json::from_value::<StripePaymentIntent>(raw)
            .unwrap()
            .into();

        assert_eq!(intent.amount, Money::usd(8991));
        assert_eq!(intent.status, IntentStatus::RequiresAction);
        assert_eq!(
            intent.next_action.unwrap().redirect_url.as_deref(),
            Some("https://hooks.stripe.com/3ds")
        );
        assert!(intent.created_at.is_some());
    }

    #[test]
    fn test_malformed_secret_rejected() {
        let err = StripeGateway::intent_path(&ClientSecret::new("nope"), "/confirm").unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }
}
