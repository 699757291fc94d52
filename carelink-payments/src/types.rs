//! Payment types and data structures

use crate::money::Money;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client secret of a payment intent.
///
/// The secret authorizes client-side confirmation, so it is held as a
/// [`SecretString`] and never printed in full.
#[derive(Clone)]
pub struct ClientSecret(SecretString);

impl ClientSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::from(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Intent id embedded in the secret (`pi_123_secret_abc` -> `pi_123`).
    pub fn intent_id(&self) -> Option<&str> {
        self.expose().split_once("_secret_").map(|(id, _)| id)
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientSecret({})", carelink_log::redact(self.expose()))
    }
}

impl PartialEq for ClientSecret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

/// Payment intent status as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
    /// Status string this client does not know.
    Unrecognized(String),
}

impl IntentStatus {
    /// Parse the gateway's status string.
    pub fn parse(s: &str) -> Self {
        match s {
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "requires_confirmation" => Self::RequiresConfirmation,
            "requires_action" => Self::RequiresAction,
            "processing" => Self::Processing,
            "succeeded" => Self::Succeeded,
            "canceled" => Self::Canceled,
            "failed" => Self::Failed,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled | Self::Failed)
    }
}

/// Additional step the customer must complete (3-D Secure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAction {
    /// Gateway action type, e.g. `use_stripe_sdk` or `redirect_to_url`.
    pub kind: String,
    /// Challenge page, when the action is a redirect.
    pub redirect_url: Option<String>,
}

/// Client-side view of a payment intent.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<ClientSecret>,
    pub amount: Money,
    pub status: IntentStatus,
    pub next_action: Option<NextAction>,
    /// Message of the last failed payment attempt, if any.
    pub last_error: Option<String>,
    /// Decline code of the last failed attempt, if any.
    pub last_decline_code: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Opaque payment-method id produced by a capture element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentMethodToken(pub String);

impl PaymentMethodToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentMethodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Create payment method request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentMethodRequest {
    /// Card details
    pub card: CardDetails,
    /// Billing details
    pub billing_details: BillingDetails,
}

/// Raw card fields as typed by the user.
#[derive(Clone, Serialize, Deserialize)]
pub struct CardDetails {
    /// Card number, digits only
    pub number: String,
    /// Expiration month (1-12)
    pub exp_month: u32,
    /// Expiration year (four digits)
    pub exp_year: u32,
    /// CVC
    pub cvc: String,
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last4: String = self
            .number
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        f.debug_struct("CardDetails")
            .field("last4", &last4)
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish_non_exhaustive()
    }
}

/// Billing details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
}

/// Postal address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_id_from_secret() {
        let secret = ClientSecret::new("pi_3NxYz_secret_s3cr3t");
        assert_eq!(secret.intent_id(), Some("pi_3NxYz"));
        assert_eq!(ClientSecret::new("garbage").intent_id(), None);
    }

    #[test]
    fn test_client_secret_debug_is_redacted() {
        let secret = ClientSecret::new("pi_1_secret_topsecret");
        let printed = format!("{:?}", secret);
        assert!(!printed.contains("topsecret"));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(IntentStatus::parse("requires_action"), IntentStatus::RequiresAction);
        assert_eq!(IntentStatus::parse("succeeded"), IntentStatus::Succeeded);
        assert_eq!(
            IntentStatus::parse("on_hold"),
            IntentStatus::Unrecognized("on_hold".into())
        );
        assert!(IntentStatus::Failed.is_terminal());
        assert!(!IntentStatus::RequiresAction.is_terminal());
    }

    #[test]
    fn test_card_details_debug_hides_number() {
        let card = CardDetails {
            number: "4242424242424242".into(),
            exp_month: 12,
            exp_year: 2030,
            cvc: "123".into(),
        };
        let printed = format!("{:?}", card);
        assert!(printed.contains("4242"));
        assert!(!printed.contains("4242424242424242"));
        assert!(!printed.contains("123\""));
    }
}
