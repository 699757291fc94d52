//! Membership checkout for the carelink provider directory
//!
//! The checkout is a four-step modal: membership terms, account creation,
//! payment method selection, then payment capture and confirmation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Wizard (step sequencer)                                          │
//! │   ├── AccountService ─┐                                          │
//! │   ├── PromoService ───┼── BackendClient (HTTP/JSON)              │
//! │   ├── PendingSubscription (quote + intent tagged with amount)    │
//! │   ├── CaptureSession ── CardElement | WalletElement              │
//! │   └── ConfirmationOrchestrator                                   │
//! │         ├── IntentService (retry: 1s, 2s)                        │
//! │         ├── PaymentGateway (confirm / retrieve)                  │
//! │         ├── ChallengeHandler (3-D Secure)                        │
//! │         └── Notifier (best effort, after commit)                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use carelink_checkout::*;
//!
//! let config = carelink_config::CheckoutConfig::from_env()?;
//! let mut wizard = Wizard::from_config(&config, challenge_handler, wallet_bridge)?;
//!
//! wizard.accept_terms()?;
//! wizard.sign_up(&profile).await?;
//! wizard.select_method(CaptureMethod::Card).await?;
//! wizard.card_input(card)?;
//! wizard.apply_promo("WELCOME25").await?;
//! let confirmation = wizard.submit(&billing).await?;
//! ```

pub mod backend;
pub mod capture;
pub mod error;
pub mod modal;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod subscription;
pub mod wizard;

pub use backend::BackendClient;
pub use capture::{
    CaptureElement, CaptureMethod, CaptureSession, CardElement, CardField, CardInput, ElementId,
    FieldError, WalletElement, validate_card,
};
pub use error::{CheckoutError, CheckoutResult, ErrorKind};
pub use modal::{ModalHandle, SubmitGuard};
pub use orchestrator::{Confirmation, ConfirmationOrchestrator, NOTIFICATION_WARNING};
pub use services::*;
pub use session::AuthSession;
pub use subscription::PendingSubscription;
pub use wizard::{CARD_CONTAINER, Wizard, WizardEvent, WizardObserver, WizardSettings, WizardStep};
