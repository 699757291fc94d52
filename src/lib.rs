// Carelink - membership checkout core for the provider directory
//
// Re-exports the workspace crates: logging, configuration, payments and the
// checkout flow itself.

// Re-export the checkout flow
pub use carelink_checkout::*;

// Re-export sibling crates
pub use carelink_config;
pub use carelink_log;
pub use carelink_payments;

#[cfg(feature = "testing")]
pub use carelink_testing;

// Prelude for common imports
pub mod prelude {
    pub use carelink_checkout::{
        AuthSession, CaptureMethod, CardInput, CheckoutError, CheckoutResult, CheckoutServices,
        Confirmation, ConfirmationOrchestrator, Credentials, ErrorKind, PendingSubscription,
        SignupProfile, Wizard, WizardObserver, WizardSettings, WizardStep,
    };
    pub use carelink_config::CheckoutConfig;
    pub use carelink_payments::{
        BillingDetails, Currency, MEMBERSHIP_BASE_PRICE, Money, PaymentGateway, Quote,
        RetryConfig, StripeGateway, pricing,
    };
}
