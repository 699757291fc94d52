//! Membership checkout wizard
//!
//! ```text
//! membership ──accept──► contact_info ──signup/login──► payment_method
//!                                                          │ select
//!                                                          ▼
//!                          done ◄──confirmed── payment_form(card | wallet)
//! ```
//!
//! The wizard owns every piece of in-memory checkout state. Closing it
//! discards all of it; nothing is persisted.

use carelink_config::CheckoutConfig;
use carelink_log::{debug, info, warn};
use carelink_payments::{BillingDetails, Currency, MEMBERSHIP_BASE_PRICE, Quote};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

use crate::capture::{
    CaptureMethod, CaptureSession, CardInput, ElementId, FieldError, WalletElement,
};
use crate::error::{CheckoutError, CheckoutResult};
use crate::modal::ModalHandle;
use crate::orchestrator::{Confirmation, ConfirmationOrchestrator};
use crate::services::{
    ChallengeHandler, CheckoutServices, Credentials, SignupProfile, WalletAvailability,
    WalletSupport,
};
use crate::session::AuthSession;
use crate::subscription::PendingSubscription;

/// Default DOM container for the card element.
pub const CARD_CONTAINER: &str = "card-element";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Membership,
    ContactInfo,
    PaymentMethod,
    PaymentForm(CaptureMethod),
    Done,
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Membership => f.write_str("membership"),
            Self::ContactInfo => f.write_str("contact_info"),
            Self::PaymentMethod => f.write_str("payment_method"),
            Self::PaymentForm(method) => write!(f, "payment_form({})", method),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Events that move the wizard forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardEvent {
    AcceptTerms,
    Authenticated,
    SelectMethod(CaptureMethod),
    PaymentConfirmed,
}

/// Next step for `(step, event)`, or `None` when the pair is not allowed.
pub fn transition(step: WizardStep, event: WizardEvent) -> Option<WizardStep> {
    use WizardEvent::*;
    use WizardStep::*;

    match (step, event) {
        (Membership, AcceptTerms) => Some(ContactInfo),
        (ContactInfo, Authenticated) => Some(PaymentMethod),
        (PaymentMethod, SelectMethod(method)) => Some(PaymentForm(method)),
        (PaymentForm(_), PaymentConfirmed) => Some(Done),
        (Membership, Authenticated | SelectMethod(_) | PaymentConfirmed)
        | (ContactInfo, AcceptTerms | SelectMethod(_) | PaymentConfirmed)
        | (PaymentMethod, AcceptTerms | Authenticated | PaymentConfirmed)
        | (PaymentForm(_), AcceptTerms | Authenticated | SelectMethod(_))
        | (Done, _) => None,
    }
}

/// Host callbacks.
pub trait WizardObserver: Send + Sync {
    /// The wizard moved to `step`.
    fn on_continue(&self, _step: WizardStep) {}

    /// The wizard was closed or finished.
    fn on_close(&self) {}
}

/// Pricing and mount settings.
#[derive(Debug, Clone)]
pub struct WizardSettings {
    pub base_price: Decimal,
    pub currency: Currency,
    pub card_container: String,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            base_price: MEMBERSHIP_BASE_PRICE,
            currency: Currency::USD,
            card_container: CARD_CONTAINER.to_string(),
        }
    }
}

impl WizardSettings {
    pub fn from_config(config: &CheckoutConfig) -> CheckoutResult<Self> {
        let currency = Currency::from_code(&config.currency).ok_or_else(|| {
            CheckoutError::Validation(format!("unsupported currency: {}", config.currency))
        })?;
        Ok(Self {
            base_price: config.membership_price,
            currency,
            card_container: CARD_CONTAINER.to_string(),
        })
    }
}

pub struct Wizard {
    step: WizardStep,
    services: CheckoutServices,
    orchestrator: Arc<ConfirmationOrchestrator>,
    settings: WizardSettings,
    modal: ModalHandle,
    session: Option<AuthSession>,
    subscription: Option<PendingSubscription>,
    capture: Option<CaptureSession>,
    wallet: Option<WalletElement>,
    observer: Option<Arc<dyn WizardObserver>>,
}

impl Wizard {
    /// Open the modal on the membership step.
    pub fn open(
        services: CheckoutServices,
        orchestrator: Arc<ConfirmationOrchestrator>,
        settings: WizardSettings,
    ) -> Self {
        info!("checkout opened");
        Self {
            step: WizardStep::Membership,
            services,
            orchestrator,
            settings,
            modal: ModalHandle::open(),
            session: None,
            subscription: None,
            capture: None,
            wallet: None,
            observer: None,
        }
    }

    /// Open against the HTTP backend and Stripe.
    pub fn from_config(
        config: &CheckoutConfig,
        challenge: Arc<dyn ChallengeHandler>,
        wallet: Arc<dyn WalletSupport>,
    ) -> CheckoutResult<Self> {
        let services = CheckoutServices::from_config(config, challenge, wallet)?;
        let orchestrator =
            ConfirmationOrchestrator::from_services(&services).with_config(config);
        Ok(Self::open(
            services,
            Arc::new(orchestrator),
            WizardSettings::from_config(config)?,
        ))
    }

    pub fn with_observer(mut self, observer: Arc<dyn WizardObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// Handle shared with in-flight operations.
    pub fn modal(&self) -> &ModalHandle {
        &self.modal
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn subscription(&self) -> Option<&PendingSubscription> {
        self.subscription.as_ref()
    }

    pub fn quote(&self) -> Option<&Quote> {
        self.subscription.as_ref().map(PendingSubscription::quote)
    }

    pub fn capture(&self) -> Option<&CaptureSession> {
        self.capture.as_ref()
    }

    pub fn capture_element_id(&self) -> Option<ElementId> {
        self.capture.as_ref().map(CaptureSession::element_id)
    }

    /// A modal closed from outside the wizard leaves state behind; drop it
    /// the first time the wizard notices.
    fn ensure_mounted(&mut self) -> CheckoutResult<()> {
        self.modal.ensure_mounted().inspect_err(|_| {
            if self.session.is_some() || self.capture.is_some() {
                info!("checkout closed externally on step {}", self.step);
            }
            self.discard();
        })
    }

    fn advance(&mut self, event: WizardEvent) -> CheckoutResult<WizardStep> {
        self.ensure_mounted()?;
        let next = transition(self.step, event).ok_or_else(|| {
            CheckoutError::Validation(format!("{:?} is not allowed on step {}", event, self.step))
        })?;

        debug!("wizard {} -> {}", self.step, next);
        self.step = next;
        if let Some(observer) = &self.observer {
            observer.on_continue(next);
        }
        Ok(next)
    }

    fn require_step(
        &mut self,
        allowed: impl Fn(WizardStep) -> bool,
        action: &str,
    ) -> CheckoutResult<()> {
        self.ensure_mounted()?;
        if allowed(self.step) {
            Ok(())
        } else {
            Err(CheckoutError::Validation(format!(
                "cannot {} on step {}",
                action, self.step
            )))
        }
    }

    pub fn accept_terms(&mut self) -> CheckoutResult<()> {
        self.advance(WizardEvent::AcceptTerms)?;
        Ok(())
    }

    /// Create the account and move on to payment.
    pub async fn sign_up(&mut self, profile: &SignupProfile) -> CheckoutResult<()> {
        self.require_step(|s| s == WizardStep::ContactInfo, "sign up")?;
        profile.validate()?;

        let accounts = self.services.accounts.clone();
        let result = accounts.signup(profile).await;
        self.ensure_mounted()?;
        self.authenticated(result?)
    }

    /// Returning members log in instead of signing up.
    pub async fn log_in(&mut self, credentials: &Credentials) -> CheckoutResult<()> {
        self.require_step(|s| s == WizardStep::ContactInfo, "log in")?;

        let accounts = self.services.accounts.clone();
        let result = accounts.login(credentials).await;
        self.ensure_mounted()?;
        self.authenticated(result?)
    }

    fn authenticated(&mut self, session: AuthSession) -> CheckoutResult<()> {
        let subscription = PendingSubscription::new(
            session.user_id(),
            self.settings.base_price,
            self.settings.currency,
        )?;
        info!("member {} authenticated", session.user_id());

        self.session = Some(session);
        self.subscription = Some(subscription);
        self.advance(WizardEvent::Authenticated)?;
        Ok(())
    }

    /// Whether the device can pay with a wallet. Cached after the first call.
    pub async fn wallet_availability(&mut self) -> CheckoutResult<WalletAvailability> {
        self.require_step(
            |s| matches!(s, WizardStep::PaymentMethod | WizardStep::PaymentForm(_)),
            "check wallet availability",
        )?;
        let amount = self
            .subscription
            .as_ref()
            .ok_or_else(|| CheckoutError::Validation("no pending subscription".into()))?
            .amount()?;

        let support = self.services.wallet.clone();
        let wallet = self.wallet.get_or_insert_with(|| WalletElement::mount(support));
        let availability = wallet.check_availability(&amount).await.clone();
        self.ensure_mounted()?;
        Ok(availability)
    }

    /// Pick how to pay. An unavailable wallet is refused with its reason.
    pub async fn select_method(&mut self, method: CaptureMethod) -> CheckoutResult<()> {
        self.require_step(|s| s == WizardStep::PaymentMethod, "select a payment method")?;

        let capture = match method {
            CaptureMethod::Card => CaptureSession::card(
                self.settings.card_container.clone(),
                self.services.gateway.clone(),
            ),
            CaptureMethod::Wallet => {
                if let WalletAvailability::Unavailable { reason } =
                    self.wallet_availability().await?
                {
                    return Err(CheckoutError::Validation(reason));
                }
                match self.wallet.take() {
                    Some(wallet) => CaptureSession::wallet(wallet),
                    None => CaptureSession::wallet(WalletElement::mount(
                        self.services.wallet.clone(),
                    )),
                }
            }
        };

        self.capture = Some(capture);
        self.advance(WizardEvent::SelectMethod(method))?;
        Ok(())
    }

    /// Feed card fields to the mounted card element; returns inline errors.
    pub fn card_input(&mut self, input: CardInput) -> CheckoutResult<Vec<FieldError>> {
        self.require_step(
            |s| s == WizardStep::PaymentForm(CaptureMethod::Card),
            "enter card details",
        )?;
        let element = self
            .capture
            .as_mut()
            .and_then(CaptureSession::card_element)
            .ok_or_else(|| CheckoutError::Validation("no card element mounted".into()))?;
        Ok(element.input(input).to_vec())
    }

    /// Validate a promo code and reprice.
    ///
    /// A rejected code, or one covering the full price, resets the discount
    /// to zero. The current intent is never modified; confirmation replaces
    /// it if the amount moved.
    pub async fn apply_promo(&mut self, code: &str) -> CheckoutResult<Quote> {
        self.require_step(|s| matches!(s, WizardStep::PaymentForm(_)), "apply a promo code")?;
        let session = self.require_session()?.clone();

        let promos = self.services.promos.clone();
        let result = promos.validate(code, &session).await;
        self.ensure_mounted()?;

        let subscription = self.subscription_mut()?;
        let applied = result.and_then(|percent| {
            let quote = *subscription.apply_discount(percent)?;
            if subscription.amount()?.is_positive() {
                Ok(quote)
            } else {
                Err(CheckoutError::Validation(
                    "This promo code covers the full price and cannot be used for online checkout."
                        .into(),
                ))
            }
        });
        match applied {
            Ok(quote) => {
                info!("promo applied: {}% off", quote.discount_percent);
                Ok(quote)
            }
            Err(err) => {
                subscription.reset_discount();
                info!("promo rejected: {}", err);
                Err(err)
            }
        }
    }

    /// Tokenize, confirm, and finish the checkout.
    pub async fn submit(&mut self, billing: &BillingDetails) -> CheckoutResult<Confirmation> {
        self.require_step(|s| matches!(s, WizardStep::PaymentForm(_)), "submit payment")?;

        let orchestrator = self.orchestrator.clone();
        let modal = self.modal.clone();
        let (session, subscription, capture) =
            match (&self.session, &mut self.subscription, &mut self.capture) {
                (Some(session), Some(subscription), Some(capture)) => {
                    (session, subscription, capture)
                }
                _ => {
                    return Err(CheckoutError::Validation(
                        "checkout is missing session or payment state".into(),
                    ));
                }
            };

        let confirmation = orchestrator
            .submit(&modal, session, subscription, capture, billing)
            .await
            .inspect_err(|err| {
                if matches!(err, CheckoutError::ModalClosed) {
                    self.discard();
                }
            })?;

        if let Some(warning) = &confirmation.warning {
            warn!("{}", warning);
        }
        self.advance(WizardEvent::PaymentConfirmed)?;
        self.finish();
        Ok(confirmation)
    }

    /// Close the modal at any step, discarding all state.
    pub fn close(&mut self) {
        let was_mounted = self.modal.is_mounted();
        self.modal.close();
        self.discard();
        if was_mounted {
            info!("checkout closed on step {}", self.step);
            if let Some(observer) = &self.observer {
                observer.on_close();
            }
        }
    }

    fn finish(&mut self) {
        info!("checkout complete");
        self.modal.close();
        self.discard();
        if let Some(observer) = &self.observer {
            observer.on_close();
        }
    }

    fn discard(&mut self) {
        self.session = None;
        self.subscription = None;
        self.capture = None;
        self.wallet = None;
    }

    fn require_session(&self) -> CheckoutResult<&AuthSession> {
        self.session
            .as_ref()
            .ok_or_else(|| CheckoutError::Validation("not signed in".into()))
    }

    fn subscription_mut(&mut self) -> CheckoutResult<&mut PendingSubscription> {
        self.subscription
            .as_mut()
            .ok_or_else(|| CheckoutError::Validation("no pending subscription".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS: [WizardStep; 6] = [
        WizardStep::Membership,
        WizardStep::ContactInfo,
        WizardStep::PaymentMethod,
        WizardStep::PaymentForm(CaptureMethod::Card),
        WizardStep::PaymentForm(CaptureMethod::Wallet),
        WizardStep::Done,
    ];

    const EVENTS: [WizardEvent; 5] = [
        WizardEvent::AcceptTerms,
        WizardEvent::Authenticated,
        WizardEvent::SelectMethod(CaptureMethod::Card),
        WizardEvent::SelectMethod(CaptureMethod::Wallet),
        WizardEvent::PaymentConfirmed,
    ];

    #[test]
    fn test_happy_path_transitions() {
        let mut step = WizardStep::Membership;
        for event in [
            WizardEvent::AcceptTerms,
            WizardEvent::Authenticated,
            WizardEvent::SelectMethod(CaptureMethod::Wallet),
            WizardEvent::PaymentConfirmed,
        ] {
            step = transition(step, event).unwrap();
        }
        assert_eq!(step, WizardStep::Done);
    }

    #[test]
    fn test_each_step_accepts_exactly_one_event_kind() {
        for step in STEPS {
            let allowed: Vec<_> = EVENTS
                .iter()
                .filter(|e| transition(step, **e).is_some())
                .collect();
            match step {
                WizardStep::PaymentMethod => assert_eq!(allowed.len(), 2),
                WizardStep::Done => assert!(allowed.is_empty()),
                _ => assert_eq!(allowed.len(), 1, "{}", step),
            }
        }
    }

    #[test]
    fn test_no_back_stack() {
        assert_eq!(
            transition(WizardStep::PaymentForm(CaptureMethod::Card), WizardEvent::SelectMethod(CaptureMethod::Wallet)),
            None
        );
        assert_eq!(transition(WizardStep::ContactInfo, WizardEvent::AcceptTerms), None);
    }

    #[test]
    fn test_step_display() {
        assert_eq!(
            WizardStep::PaymentForm(CaptureMethod::Card).to_string(),
            "payment_form(card)"
        );
        assert_eq!(WizardStep::ContactInfo.to_string(), "contact_info");
    }

    #[test]
    fn test_settings_from_config() {
        let settings = WizardSettings::from_config(&CheckoutConfig::default()).unwrap();
        assert_eq!(settings.base_price, MEMBERSHIP_BASE_PRICE);
        assert_eq!(settings.currency, Currency::USD);
    }
}
