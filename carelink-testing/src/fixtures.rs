// Ready-made inputs and a bundle of mocks wired into a checkout

use carelink_checkout::{
    AuthSession, CardInput, CheckoutServices, ConfirmationOrchestrator, Credentials,
    SignupProfile, Wizard, WizardSettings,
};
use carelink_payments::{BillingDetails, RetryConfig};
use secrecy::SecretString;
use std::sync::Arc;

use crate::mock::*;

pub fn session() -> AuthSession {
    AuthSession::new("user_mock", "tok_mock")
}

pub fn profile() -> SignupProfile {
    SignupProfile {
        first_name: "Dana".into(),
        last_name: "Reyes".into(),
        email: "dana@example.org".into(),
        phone: Some("555-0100".into()),
        password: SecretString::from("correct horse battery".to_string()),
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        email: "dana@example.org".into(),
        password: SecretString::from("correct horse battery".to_string()),
    }
}

/// A card that passes every local check.
pub fn valid_card() -> CardInput {
    CardInput {
        number: "4242 4242 4242 4242".into(),
        exp_month: 12,
        exp_year: 2045,
        cvc: "123".into(),
    }
}

pub fn billing() -> BillingDetails {
    BillingDetails {
        name: Some("Dana Reyes".into()),
        email: Some("dana@example.org".into()),
        ..Default::default()
    }
}

/// One mock per collaborator; clones share recorded state.
#[derive(Clone, Default)]
pub struct MockServices {
    pub accounts: MockAccountService,
    pub promos: MockPromoService,
    pub intents: MockIntentService,
    pub notifier: MockNotifier,
    pub gateway: MockGateway,
    pub challenge: MockChallengeHandler,
    pub wallet: MockWalletSupport,
}

impl MockServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn services(&self) -> CheckoutServices {
        CheckoutServices {
            accounts: Arc::new(self.accounts.clone()),
            promos: Arc::new(self.promos.clone()),
            intents: Arc::new(self.intents.clone()),
            notifier: Arc::new(self.notifier.clone()),
            gateway: Arc::new(self.gateway.clone()),
            challenge: Arc::new(self.challenge.clone()),
            wallet: Arc::new(self.wallet.clone()),
        }
    }

    /// Orchestrator with the default intent retry policy (2 retries, 1s step).
    pub fn orchestrator(&self) -> ConfirmationOrchestrator {
        ConfirmationOrchestrator::from_services(&self.services()).with_retry(RetryConfig::default())
    }

    pub fn wizard(&self) -> Wizard {
        Wizard::open(
            self.services(),
            Arc::new(self.orchestrator()),
            WizardSettings::default(),
        )
    }
}
