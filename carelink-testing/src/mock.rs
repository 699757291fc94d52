// Recording mocks for every checkout collaborator

use async_trait::async_trait;
use carelink_checkout::{
    AccountService, AuthSession, ChallengeHandler, ChallengeResult, CheckoutError, CheckoutResult,
    Credentials, IntentHandle, IntentService, Notifier, PromoService, SignupProfile,
    WalletAvailability, WalletSupport,
};
use carelink_payments::{
    ClientSecret, CreatePaymentMethodRequest, IntentStatus, Money, NextAction, PaymentGateway,
    PaymentIntent, PaymentMethodToken, PaymentResult,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    lock(queue).pop_front()
}

type Calls = Arc<Mutex<Vec<(String, Vec<String>)>>>;

/// Shared call recorder
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Calls,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a method call with arguments
    pub fn record(&self, method: &str, args: Vec<String>) {
        lock(&self.calls).push((method.to_string(), args));
    }

    /// Get the number of calls
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Get the number of calls to a specific method
    pub fn method_call_count(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|(m, _)| m == method).count()
    }

    /// Check if a method was called
    pub fn was_called(&self, method: &str) -> bool {
        self.method_call_count(method) > 0
    }

    /// Get all calls
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.calls).clone()
    }

    /// Method names in call order
    pub fn methods(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(m, _)| m.clone()).collect()
    }

    /// Clear all calls
    pub fn clear(&self) {
        lock(&self.calls).clear();
    }
}

/// Callback run while a mock call is in flight.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Build a gateway intent in the given state.
pub fn intent(id: &str, amount: Money, status: IntentStatus) -> PaymentIntent {
    PaymentIntent {
        id: id.to_string(),
        client_secret: Some(ClientSecret::new(format!("{}_secret_mock", id))),
        amount,
        status,
        next_action: None,
        last_error: None,
        last_decline_code: None,
        created_at: None,
    }
}

/// Intent waiting on a 3-D Secure challenge.
pub fn requires_action(id: &str, amount: Money) -> PaymentIntent {
    PaymentIntent {
        next_action: Some(NextAction {
            kind: "use_stripe_sdk".into(),
            redirect_url: None,
        }),
        ..intent(id, amount, IntentStatus::RequiresAction)
    }
}

/// Intent whose last attempt the issuer declined.
pub fn declined(id: &str, amount: Money, decline_code: &str) -> PaymentIntent {
    PaymentIntent {
        last_error: Some("Your card was declined.".into()),
        last_decline_code: Some(decline_code.to_string()),
        ..intent(id, amount, IntentStatus::RequiresPaymentMethod)
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// Payment gateway with scripted responses.
///
/// Unscripted tokenizations return `pm_mock_<n>`; unscripted confirmations
/// succeed.
#[derive(Clone, Default)]
pub struct MockGateway {
    log: CallLog,
    tokens: Arc<Mutex<VecDeque<PaymentResult<PaymentMethodToken>>>>,
    confirmations: Arc<Mutex<VecDeque<PaymentResult<PaymentIntent>>>>,
    on_confirm: Arc<Mutex<Option<Hook>>>,
    last: Arc<Mutex<Option<PaymentIntent>>>,
    counter: Arc<AtomicU32>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next tokenization
    pub fn push_token(&self, result: PaymentResult<PaymentMethodToken>) -> &Self {
        lock(&self.tokens).push_back(result);
        self
    }

    /// Queue the result of the next confirmation
    pub fn push_confirmation(&self, result: PaymentResult<PaymentIntent>) -> &Self {
        lock(&self.confirmations).push_back(result);
        self
    }

    /// Run `hook` inside every confirmation call, before it returns.
    pub fn on_confirm(&self, hook: Hook) {
        *lock(&self.on_confirm) = Some(hook);
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn confirm_count(&self) -> usize {
        self.log.method_call_count("confirm_intent")
    }

    /// Intent ids passed to `confirm_intent`, in order.
    pub fn confirmed_intents(&self) -> Vec<String> {
        self.log
            .calls()
            .into_iter()
            .filter(|(m, _)| m == "confirm_intent")
            .filter_map(|(_, args)| args.into_iter().next())
            .collect()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_payment_method(
        &self,
        request: CreatePaymentMethodRequest,
    ) -> PaymentResult<PaymentMethodToken> {
        let last4: String = request.card.number.chars().skip(12).collect();
        self.log.record("create_payment_method", vec![last4]);

        pop(&self.tokens).unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(PaymentMethodToken(format!("pm_mock_{}", n)))
        })
    }

    async fn confirm_intent(
        &self,
        client_secret: &ClientSecret,
        payment_method: &PaymentMethodToken,
    ) -> PaymentResult<PaymentIntent> {
        let id = client_secret.intent_id().unwrap_or("pi_unknown").to_string();
        self.log
            .record("confirm_intent", vec![id.clone(), payment_method.to_string()]);

        let hook = lock(&self.on_confirm).clone();
        if let Some(hook) = hook {
            hook();
        }

        let result = pop(&self.confirmations)
            .unwrap_or_else(|| Ok(intent(&id, Money::usd(0), IntentStatus::Succeeded)));
        let result = result.map(|mut confirmed| {
            confirmed.id = id.clone();
            confirmed
        });
        if let Ok(confirmed) = &result {
            *lock(&self.last) = Some(confirmed.clone());
        }
        result
    }

    async fn retrieve_intent(&self, client_secret: &ClientSecret) -> PaymentResult<PaymentIntent> {
        let id = client_secret.intent_id().unwrap_or("pi_unknown").to_string();
        self.log.record("retrieve_intent", vec![id.clone()]);

        Ok(lock(&self.last).clone().unwrap_or_else(|| {
            intent(&id, Money::usd(0), IntentStatus::RequiresPaymentMethod)
        }))
    }
}

// ============================================================================
// Intent service
// ============================================================================

/// One `create_intent` call.
#[derive(Debug, Clone)]
pub struct IntentAttempt {
    pub amount: Money,
    pub user_id: String,
    pub at: Instant,
}

/// Intent service that allocates `pi_mock_<n>` unless a failure is queued.
#[derive(Clone, Default)]
pub struct MockIntentService {
    failures: Arc<Mutex<VecDeque<CheckoutError>>>,
    attempts: Arc<Mutex<Vec<IntentAttempt>>>,
    created: Arc<AtomicU32>,
}

impl MockIntentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls with `error`.
    pub fn fail_times(&self, times: usize, error: CheckoutError) -> &Self {
        let mut failures = lock(&self.failures);
        for _ in 0..times {
            failures.push_back(error.clone());
        }
        self
    }

    pub fn attempts(&self) -> Vec<IntentAttempt> {
        lock(&self.attempts).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.attempts).len()
    }

    /// Number of intents actually created.
    pub fn created_count(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentService for MockIntentService {
    async fn create_intent(
        &self,
        session: &AuthSession,
        amount: Money,
        subject_user_id: &str,
    ) -> CheckoutResult<IntentHandle> {
        lock(&self.attempts).push(IntentAttempt {
            amount,
            user_id: subject_user_id.to_string(),
            at: Instant::now(),
        });
        carelink_checkout::check_intent_request(session, &amount)?;

        if let Some(error) = pop(&self.failures) {
            return Err(error);
        }

        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let intent_id = format!("pi_mock_{}", n);
        Ok(IntentHandle {
            client_secret: ClientSecret::new(format!("{}_secret_test", intent_id)),
            intent_id,
            amount,
        })
    }
}

// ============================================================================
// Accounts and promos
// ============================================================================

/// Account service returning `user_mock` sessions unless a result is queued.
#[derive(Clone, Default)]
pub struct MockAccountService {
    log: CallLog,
    results: Arc<Mutex<VecDeque<CheckoutResult<AuthSession>>>>,
}

impl MockAccountService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, result: CheckoutResult<AuthSession>) -> &Self {
        lock(&self.results).push_back(result);
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    fn next(&self) -> CheckoutResult<AuthSession> {
        pop(&self.results).unwrap_or_else(|| Ok(AuthSession::new("user_mock", "tok_mock")))
    }
}

#[async_trait]
impl AccountService for MockAccountService {
    async fn signup(&self, profile: &SignupProfile) -> CheckoutResult<AuthSession> {
        self.log.record("signup", vec![profile.email.clone()]);
        self.next()
    }

    async fn login(&self, credentials: &Credentials) -> CheckoutResult<AuthSession> {
        self.log.record("login", vec![credentials.email.clone()]);
        self.next()
    }
}

/// Promo service backed by a fixed code table.
#[derive(Clone, Default)]
pub struct MockPromoService {
    log: CallLog,
    codes: Arc<Mutex<HashMap<String, Decimal>>>,
}

impl MockPromoService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(self, code: &str, discount_percent: Decimal) -> Self {
        lock(&self.codes).insert(code.to_string(), discount_percent);
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

#[async_trait]
impl PromoService for MockPromoService {
    async fn validate(&self, code: &str, _session: &AuthSession) -> CheckoutResult<Decimal> {
        self.log.record("validate", vec![code.to_string()]);
        lock(&self.codes)
            .get(code)
            .copied()
            .ok_or_else(|| CheckoutError::Validation(format!("Invalid promo code: {}", code)))
    }
}

// ============================================================================
// Notifier, challenge and wallet
// ============================================================================

#[derive(Clone, Default)]
pub struct MockNotifier {
    log: CallLog,
    failing: Arc<AtomicBool>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail with a transient error.
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn sent_count(&self) -> usize {
        self.log.method_call_count("send_subscription_confirmation")
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_subscription_confirmation(
        &self,
        _session: &AuthSession,
        user_id: &str,
    ) -> CheckoutResult<()> {
        self.log
            .record("send_subscription_confirmation", vec![user_id.to_string()]);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CheckoutError::Transient("mail relay unavailable".into()));
        }
        Ok(())
    }
}

/// Challenge handler that authenticates unless a result is queued.
#[derive(Clone, Default)]
pub struct MockChallengeHandler {
    log: CallLog,
    results: Arc<Mutex<VecDeque<ChallengeResult>>>,
}

impl MockChallengeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_result(&self, result: ChallengeResult) -> &Self {
        lock(&self.results).push_back(result);
        self
    }

    pub fn challenge_count(&self) -> usize {
        self.log.call_count()
    }
}

#[async_trait]
impl ChallengeHandler for MockChallengeHandler {
    async fn authenticate(
        &self,
        action: &NextAction,
        client_secret: &ClientSecret,
    ) -> ChallengeResult {
        self.log.record(
            "authenticate",
            vec![
                action.kind.clone(),
                client_secret.intent_id().unwrap_or_default().to_string(),
            ],
        );
        pop(&self.results).unwrap_or(ChallengeResult::Authenticated)
    }
}

/// Wallet bridge with fixed availability.
#[derive(Clone)]
pub struct MockWalletSupport {
    log: CallLog,
    availability: Arc<Mutex<WalletAvailability>>,
    tokens: Arc<Mutex<VecDeque<CheckoutResult<PaymentMethodToken>>>>,
}

impl Default for MockWalletSupport {
    fn default() -> Self {
        Self::available()
    }
}

impl MockWalletSupport {
    pub fn available() -> Self {
        Self {
            log: CallLog::new(),
            availability: Arc::new(Mutex::new(WalletAvailability::Available)),
            tokens: Arc::default(),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        let wallet = Self::available();
        *lock(&wallet.availability) = WalletAvailability::Unavailable {
            reason: reason.to_string(),
        };
        wallet
    }

    pub fn push_token(&self, result: CheckoutResult<PaymentMethodToken>) -> &Self {
        lock(&self.tokens).push_back(result);
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

#[async_trait]
impl WalletSupport for MockWalletSupport {
    async fn availability(&self, amount: &Money) -> WalletAvailability {
        self.log.record("availability", vec![amount.to_string()]);
        lock(&self.availability).clone()
    }

    async fn request_token(&self, amount: &Money) -> CheckoutResult<PaymentMethodToken> {
        self.log.record("request_token", vec![amount.to_string()]);
        pop(&self.tokens).unwrap_or_else(|| Ok(PaymentMethodToken("pm_wallet_mock".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_log() {
        let log = CallLog::new();
        log.record("confirm_intent", vec!["pi_1".to_string()]);
        log.record("retrieve_intent", vec!["pi_1".to_string()]);
        assert_eq!(log.call_count(), 2);
        assert_eq!(log.method_call_count("confirm_intent"), 1);
        assert!(log.was_called("retrieve_intent"));
        log.clear();
        assert_eq!(log.call_count(), 0);
    }

    #[tokio::test]
    async fn test_gateway_defaults_and_queue() {
        let gateway = MockGateway::new();
        gateway.push_confirmation(Ok(intent("ignored", Money::usd(100), IntentStatus::Failed)));
        let secret = ClientSecret::new("pi_9_secret_x");
        let token = PaymentMethodToken("pm_1".into());

        let first = gateway.confirm_intent(&secret, &token).await.unwrap();
        assert_eq!(first.id, "pi_9");
        assert_eq!(first.status, IntentStatus::Failed);

        let second = gateway.confirm_intent(&secret, &token).await.unwrap();
        assert_eq!(second.status, IntentStatus::Succeeded);
        assert_eq!(gateway.confirmed_intents(), vec!["pi_9", "pi_9"]);
    }

    #[tokio::test]
    async fn test_intent_service_failures_then_success() {
        let intents = MockIntentService::new();
        intents.fail_times(1, CheckoutError::Transient("502".into()));
        let session = AuthSession::new("u_1", "tok");

        assert!(intents.create_intent(&session, Money::usd(100), "u_1").await.is_err());
        let handle = intents
            .create_intent(&session, Money::usd(100), "u_1")
            .await
            .unwrap();
        assert_eq!(handle.intent_id, "pi_mock_1");
        assert_eq!(intents.call_count(), 2);
        assert_eq!(intents.created_count(), 1);
    }

    #[tokio::test]
    async fn test_promo_table() {
        let promos = MockPromoService::new().with_code("WELCOME25", Decimal::from(25));
        let session = AuthSession::new("u_1", "tok");
        assert_eq!(promos.validate("WELCOME25", &session).await.unwrap(), Decimal::from(25));
        assert!(promos.validate("BOGUS", &session).await.is_err());
    }
}
