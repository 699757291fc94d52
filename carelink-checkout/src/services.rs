//! Collaborator seams of the checkout flow
//!
//! Every external dependency is a `Send + Sync` trait object so the flow can
//! run against the HTTP backend in production and recording mocks in tests.

use async_trait::async_trait;
use carelink_config::CheckoutConfig;
use carelink_payments::{
    ClientSecret, Money, NextAction, PaymentGateway, PaymentMethodToken, StripeGateway,
};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::BackendClient;
use crate::error::{CheckoutError, CheckoutResult};
use crate::session::AuthSession;

/// New-member details collected on the contact step.
#[derive(Clone)]
pub struct SignupProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: SecretString,
}

impl fmt::Debug for SignupProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupProfile")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .finish_non_exhaustive()
    }
}

impl SignupProfile {
    /// Local checks before the profile is sent to the backend.
    pub fn validate(&self) -> CheckoutResult<()> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(CheckoutError::Validation("name is required".into()));
        }
        if !self.email.contains('@') {
            return Err(CheckoutError::Validation("a valid email is required".into()));
        }
        if self.password.expose_secret().len() < 8 {
            return Err(CheckoutError::Validation(
                "password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }
}

/// Returning-member credentials.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// A freshly created payment intent.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentHandle {
    pub intent_id: String,
    pub client_secret: ClientSecret,
    /// Amount the intent was created for.
    pub amount: Money,
}

/// Outcome of a 3-D Secure challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeResult {
    Authenticated,
    Failed(String),
}

/// Whether the device can pay with a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletAvailability {
    Available,
    Unavailable { reason: String },
}

impl WalletAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn signup(&self, profile: &SignupProfile) -> CheckoutResult<AuthSession>;

    async fn login(&self, credentials: &Credentials) -> CheckoutResult<AuthSession>;
}

#[async_trait]
pub trait PromoService: Send + Sync {
    /// Resolve a promo code to a discount percentage.
    async fn validate(&self, code: &str, session: &AuthSession) -> CheckoutResult<Decimal>;
}

/// Backend proxy that allocates payment intents.
///
/// Every call creates a new intent; callers must not assume idempotency.
#[async_trait]
pub trait IntentService: Send + Sync {
    async fn create_intent(
        &self,
        session: &AuthSession,
        amount: Money,
        subject_user_id: &str,
    ) -> CheckoutResult<IntentHandle>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_subscription_confirmation(
        &self,
        session: &AuthSession,
        user_id: &str,
    ) -> CheckoutResult<()>;
}

/// Runs the 3-D Secure challenge the gateway asked for.
#[async_trait]
pub trait ChallengeHandler: Send + Sync {
    async fn authenticate(
        &self,
        action: &NextAction,
        client_secret: &ClientSecret,
    ) -> ChallengeResult;
}

/// Device wallet (Apple Pay, Google Pay) bridge.
#[async_trait]
pub trait WalletSupport: Send + Sync {
    async fn availability(&self, amount: &Money) -> WalletAvailability;

    /// Show the wallet sheet and return the payment method it produced.
    async fn request_token(&self, amount: &Money) -> CheckoutResult<PaymentMethodToken>;
}

/// Preconditions shared by every [`IntentService`] implementation.
pub fn check_intent_request(session: &AuthSession, amount: &Money) -> CheckoutResult<()> {
    session.ensure_usable()?;
    if !amount.is_positive() {
        return Err(CheckoutError::Validation(format!(
            "intent amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// Everything the checkout talks to.
#[derive(Clone)]
pub struct CheckoutServices {
    pub accounts: Arc<dyn AccountService>,
    pub promos: Arc<dyn PromoService>,
    pub intents: Arc<dyn IntentService>,
    pub notifier: Arc<dyn Notifier>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub challenge: Arc<dyn ChallengeHandler>,
    pub wallet: Arc<dyn WalletSupport>,
}

impl CheckoutServices {
    /// Wire the HTTP backend and the Stripe gateway from configuration.
    ///
    /// The challenge handler and wallet bridge are host-provided.
    pub fn from_config(
        config: &CheckoutConfig,
        challenge: Arc<dyn ChallengeHandler>,
        wallet: Arc<dyn WalletSupport>,
    ) -> CheckoutResult<Self> {
        let backend = Arc::new(BackendClient::new(config)?);
        let gateway = StripeGateway::with_base_url(
            config.gateway_base_url.clone(),
            config.publishable_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;

        Ok(Self {
            accounts: backend.clone(),
            promos: backend.clone(),
            intents: backend.clone(),
            notifier: backend,
            gateway: Arc::new(gateway),
            challenge,
            wallet,
        })
    }
}
