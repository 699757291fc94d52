//! Payment confirmation
//!
//! ```text
//!  submit ──► lock ──► tokenize ──► ensure intent ──► confirm
//!                                    (retry 1s, 2s)      │
//!                 ┌──────────────────────┬───────────────┼─────────────────┐
//!             succeeded            requires_action     failed / other
//!                 │                      │                 │
//!             committed             3-D Secure ──► confirm once more
//!                 │                                        │
//!           email (best effort)                     reset capture, error
//! ```
//!
//! Every await point is followed by a mount check; a result that arrives after
//! the modal closed is logged and dropped without touching any state.

use carelink_config::CheckoutConfig;
use carelink_log::{debug, error, info, warn};
use carelink_payments::{
    BillingDetails, DeclineCode, IntentStatus, Money, NextAction, PaymentGateway, PaymentIntent,
    PaymentMethodToken, RetryConfig,
};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::CaptureSession;
use crate::error::{CheckoutError, CheckoutResult};
use crate::modal::ModalHandle;
use crate::services::{
    ChallengeHandler, ChallengeResult, CheckoutServices, IntentHandle, IntentService, Notifier,
    check_intent_request,
};
use crate::session::AuthSession;
use crate::subscription::PendingSubscription;

/// Shown when the payment went through but the email did not.
pub const NOTIFICATION_WARNING: &str =
    "Payment succeeded, but we could not send your confirmation email.";

/// A committed payment.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub intent_id: String,
    pub amount: Money,
    /// A 3-D Secure challenge was completed on the way.
    pub challenged: bool,
    /// Non-fatal problem after the payment committed.
    pub warning: Option<String>,
}

/// Marker for a payment the gateway reported as succeeded. Nothing after
/// this point may turn the outcome into a payment failure.
struct Committed {
    intent_id: String,
    amount: Money,
    challenged: bool,
}

pub struct ConfirmationOrchestrator {
    intents: Arc<dyn IntentService>,
    gateway: Arc<dyn PaymentGateway>,
    challenge: Arc<dyn ChallengeHandler>,
    notifier: Arc<dyn Notifier>,
    retry: RetryConfig,
}

impl ConfirmationOrchestrator {
    pub fn new(
        intents: Arc<dyn IntentService>,
        gateway: Arc<dyn PaymentGateway>,
        challenge: Arc<dyn ChallengeHandler>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            intents,
            gateway,
            challenge,
            notifier,
            retry: RetryConfig::default(),
        }
    }

    pub fn from_services(services: &CheckoutServices) -> Self {
        Self::new(
            services.intents.clone(),
            services.gateway.clone(),
            services.challenge.clone(),
            services.notifier.clone(),
        )
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Apply the intent retry policy from configuration.
    pub fn with_config(self, config: &CheckoutConfig) -> Self {
        self.with_retry(RetryConfig::linear(
            config.max_intent_retries,
            Duration::from_millis(config.intent_retry_delay_ms),
        ))
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Tokenize the mounted element and confirm the payment.
    pub async fn submit(
        &self,
        modal: &ModalHandle,
        session: &AuthSession,
        subscription: &mut PendingSubscription,
        capture: &mut CaptureSession,
        billing: &BillingDetails,
    ) -> CheckoutResult<Confirmation> {
        let _guard = modal.try_begin_submit()?;
        let amount = subscription.amount()?;

        let tokenized = capture.tokenize(billing, &amount).await;
        if !modal.is_mounted() {
            return Err(dropped("tokenization"));
        }
        let token = match tokenized {
            Ok(token) => token,
            Err(err) => {
                if matches!(err, CheckoutError::Card(_)) {
                    capture.reset(&err);
                }
                return Err(err);
            }
        };

        self.confirm_locked(modal, session, subscription, capture, &token)
            .await
    }

    /// Confirm with a token the host already obtained.
    pub async fn confirm(
        &self,
        modal: &ModalHandle,
        session: &AuthSession,
        subscription: &mut PendingSubscription,
        capture: &mut CaptureSession,
        token: &PaymentMethodToken,
    ) -> CheckoutResult<Confirmation> {
        let _guard = modal.try_begin_submit()?;
        self.confirm_locked(modal, session, subscription, capture, token)
            .await
    }

    async fn confirm_locked(
        &self,
        modal: &ModalHandle,
        session: &AuthSession,
        subscription: &mut PendingSubscription,
        capture: &mut CaptureSession,
        token: &PaymentMethodToken,
    ) -> CheckoutResult<Confirmation> {
        let outcome = self.run(modal, session, subscription, token).await;

        match outcome {
            Ok(committed) => self.finish(modal, session, subscription, committed).await,
            Err(CheckoutError::ModalClosed) => Err(CheckoutError::ModalClosed),
            Err(err) => {
                warn!("payment not completed: {}", err);
                capture.reset(&err);
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        modal: &ModalHandle,
        session: &AuthSession,
        subscription: &mut PendingSubscription,
        token: &PaymentMethodToken,
    ) -> CheckoutResult<Committed> {
        let handle = self.ensure_intent(modal, session, subscription).await?;

        let intent = self
            .confirm_once(modal, &handle, token)
            .await
            .inspect_err(|err| discard_if_rejected(subscription, err))?;
        match &intent.status {
            IntentStatus::Succeeded => Ok(committed(&handle, false)),
            IntentStatus::RequiresAction => {
                self.authenticate(modal, &handle, &intent).await?;

                let second = self
                    .confirm_once(modal, &handle, token)
                    .await
                    .map_err(|err| {
                        discard_if_rejected(subscription, &err);
                        second_confirmation_failed(err)
                    })?;
                match &second.status {
                    IntentStatus::Succeeded => Ok(committed(&handle, true)),
                    status => {
                        discard_if_terminal(subscription, status);
                        Err(CheckoutError::Card(failure_message(
                            &second,
                            "Your bank could not authenticate this payment.",
                        )))
                    }
                }
            }
            status => {
                discard_if_terminal(subscription, status);
                Err(rejected(&intent))
            }
        }
    }

    /// Reuse the subscription's intent when it matches the current amount,
    /// otherwise create a new one under the retry policy.
    async fn ensure_intent(
        &self,
        modal: &ModalHandle,
        session: &AuthSession,
        subscription: &mut PendingSubscription,
    ) -> CheckoutResult<IntentHandle> {
        if let Some(handle) = subscription.usable_intent()? {
            debug!("reusing intent {}", handle.intent_id);
            return Ok(handle.clone());
        }
        if let Some(stale) = subscription.discard_intent() {
            info!(
                "discarding intent {} created for {}",
                stale.intent_id, stale.amount
            );
        }

        let amount = subscription.amount()?;
        check_intent_request(session, &amount)?;

        let intents = &self.intents;
        let user_id = subscription.user_id();
        let result = self
            .retry
            .run(|attempt| async move {
                debug!("creating intent for {} (attempt {})", amount, attempt);
                intents.create_intent(session, amount, user_id).await
            })
            .await;
        modal.ensure_mounted().map_err(|_| dropped("intent creation"))?;

        let handle = result.map_err(|err| {
            error!("intent creation failed after {} attempts", err.attempts());
            CheckoutError::from(err)
        })?;
        info!("intent {} ready for {}", handle.intent_id, handle.amount);
        subscription.attach_intent(handle.clone());
        Ok(handle)
    }

    async fn confirm_once(
        &self,
        modal: &ModalHandle,
        handle: &IntentHandle,
        token: &PaymentMethodToken,
    ) -> CheckoutResult<PaymentIntent> {
        let result = self
            .gateway
            .confirm_intent(&handle.client_secret, token)
            .await;
        modal.ensure_mounted().map_err(|_| dropped("confirmation"))?;

        let intent = result?;
        info!("intent {} confirmed: {:?}", intent.id, intent.status);
        Ok(intent)
    }

    async fn authenticate(
        &self,
        modal: &ModalHandle,
        handle: &IntentHandle,
        intent: &PaymentIntent,
    ) -> CheckoutResult<()> {
        let action = intent.next_action.clone().unwrap_or_else(|| NextAction {
            kind: "use_stripe_sdk".into(),
            redirect_url: None,
        });
        debug!("intent {} requires {}", intent.id, action.kind);

        let result = self
            .challenge
            .authenticate(&action, &handle.client_secret)
            .await;
        modal.ensure_mounted().map_err(|_| dropped("authentication"))?;

        match result {
            ChallengeResult::Authenticated => Ok(()),
            ChallengeResult::Failed(reason) => {
                info!("3-D Secure failed for {}: {}", intent.id, reason);
                Err(CheckoutError::Card(format!(
                    "Your bank could not authenticate this payment: {}",
                    reason
                )))
            }
        }
    }

    /// Post-commit work. Never returns a payment failure.
    async fn finish(
        &self,
        modal: &ModalHandle,
        session: &AuthSession,
        subscription: &mut PendingSubscription,
        committed: Committed,
    ) -> CheckoutResult<Confirmation> {
        info!(
            "payment committed: intent {} for {}",
            committed.intent_id, committed.amount
        );
        subscription.discard_intent();

        let warning = match self
            .notifier
            .send_subscription_confirmation(session, subscription.user_id())
            .await
        {
            Ok(()) => None,
            Err(err) => {
                warn!("confirmation email failed: {}", err);
                Some(NOTIFICATION_WARNING.to_string())
            }
        };

        if !modal.is_mounted() {
            info!(
                "payment {} committed after checkout closed; result dropped",
                committed.intent_id
            );
            return Err(CheckoutError::ModalClosed);
        }

        Ok(Confirmation {
            intent_id: committed.intent_id,
            amount: committed.amount,
            challenged: committed.challenged,
            warning,
        })
    }
}

fn committed(handle: &IntentHandle, challenged: bool) -> Committed {
    Committed {
        intent_id: handle.intent_id.clone(),
        amount: handle.amount,
        challenged,
    }
}

fn dropped(stage: &str) -> CheckoutError {
    info!("checkout closed during {}; late result dropped", stage);
    CheckoutError::ModalClosed
}

fn discard_if_terminal(subscription: &mut PendingSubscription, status: &IntentStatus) {
    if status.is_terminal() {
        subscription.discard_intent();
    }
}

/// The gateway refused the confirmation request itself (canceled or expired
/// intent, bad secret). The intent cannot be confirmed again.
fn discard_if_rejected(subscription: &mut PendingSubscription, err: &CheckoutError) {
    if matches!(err, CheckoutError::Client(_)) {
        if let Some(stale) = subscription.discard_intent() {
            info!("discarding intent {} rejected by the gateway", stale.intent_id);
        }
    }
}

/// After a completed challenge any confirmation failure is a card failure.
fn second_confirmation_failed(err: CheckoutError) -> CheckoutError {
    match err {
        CheckoutError::ModalClosed | CheckoutError::Card(_) => err,
        other => {
            warn!("confirmation after 3-D Secure failed: {}", other);
            CheckoutError::Card("Your bank could not authenticate this payment.".into())
        }
    }
}

fn failure_message(intent: &PaymentIntent, fallback: &str) -> String {
    match intent.last_decline_code.as_deref() {
        Some(code) => DeclineCode::parse(code).message().to_string(),
        None => intent
            .last_error
            .clone()
            .unwrap_or_else(|| fallback.to_string()),
    }
}

/// Error for a confirmation that neither succeeded nor asked for a challenge.
fn rejected(intent: &PaymentIntent) -> CheckoutError {
    if intent.last_decline_code.is_some() {
        return CheckoutError::Card(failure_message(intent, ""));
    }
    let message = match &intent.status {
        IntentStatus::Unrecognized(status) => format!("unexpected payment status {}", status),
        status => intent
            .last_error
            .clone()
            .unwrap_or_else(|| format!("payment ended in status {:?}", status)),
    };
    CheckoutError::Payment(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_payments::ClientSecret;

    fn intent(status: IntentStatus, decline: Option<&str>) -> PaymentIntent {
        PaymentIntent {
            id: "pi_1".into(),
            client_secret: Some(ClientSecret::new("pi_1_secret_x")),
            amount: Money::usd(11988),
            status,
            next_action: None,
            last_error: Some("Your card was declined.".into()),
            last_decline_code: decline.map(Into::into),
            created_at: None,
        }
    }

    #[test]
    fn test_decline_maps_to_card_error() {
        let err = rejected(&intent(
            IntentStatus::RequiresPaymentMethod,
            Some("insufficient_funds"),
        ));
        assert_eq!(
            err,
            CheckoutError::Card("Your card has insufficient funds.".into())
        );
    }

    #[test]
    fn test_failed_without_decline_is_payment_error() {
        let err = rejected(&intent(IntentStatus::Failed, None));
        assert_eq!(err, CheckoutError::Payment("Your card was declined.".into()));
    }

    #[test]
    fn test_unknown_status_is_payment_error() {
        let err = rejected(&intent(IntentStatus::Unrecognized("on_hold".into()), None));
        assert!(matches!(err, CheckoutError::Payment(m) if m.contains("on_hold")));
    }

    #[test]
    fn test_config_retry_policy() {
        let config = CheckoutConfig::default();
        let retry = RetryConfig::linear(
            config.max_intent_retries,
            Duration::from_millis(config.intent_retry_delay_ms),
        );
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.delay_before_retry(1), Duration::from_millis(1000));
        assert_eq!(retry.delay_before_retry(2), Duration::from_millis(2000));
    }
}
