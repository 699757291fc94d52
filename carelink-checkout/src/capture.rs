//! Card and wallet capture elements
//!
//! A capture element turns what the member entered (card fields or a wallet
//! sheet) into a gateway payment-method token. Elements are single-use with
//! respect to errors: once an element is flagged with an error it refuses to
//! tokenize, and [`CaptureSession::reset`] replaces it with a freshly mounted
//! element carrying a new [`ElementId`].

use async_trait::async_trait;
use carelink_log::{debug, info};
use carelink_payments::{
    BillingDetails, CardDetails, CreatePaymentMethodRequest, Money, PaymentGateway,
    PaymentMethodToken,
};
use chrono::{Datelike, NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{CheckoutError, CheckoutResult};
use crate::services::{WalletAvailability, WalletSupport};

/// How the member pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureMethod {
    Card,
    Wallet,
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Card => f.write_str("card"),
            Self::Wallet => f.write_str("wallet"),
        }
    }
}

/// Identity of one mounted element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(Uuid);

impl ElementId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el_{}", self.0.simple())
    }
}

#[async_trait]
pub trait CaptureElement: Send + Sync {
    fn id(&self) -> ElementId;

    fn method(&self) -> CaptureMethod;

    /// Error the element is currently flagged with.
    fn error(&self) -> Option<&str>;

    fn flag_error(&mut self, message: String);

    /// Produce a payment-method token for `amount`.
    async fn tokenize(
        &mut self,
        billing: &BillingDetails,
        amount: &Money,
    ) -> CheckoutResult<PaymentMethodToken>;

    /// Mount a new element with the same configuration.
    fn remount(&self) -> Box<dyn CaptureElement>;

    fn as_card_mut(&mut self) -> Option<&mut CardElement> {
        None
    }
}

fn refuse_flagged(error: Option<&str>) -> CheckoutResult<()> {
    match error {
        Some(message) => Err(CheckoutError::Validation(format!(
            "payment element must be reset before retrying ({})",
            message
        ))),
        None => Ok(()),
    }
}

// ============================================================================
// Card
// ============================================================================

/// Raw card fields.
#[derive(Clone, PartialEq, Eq)]
pub struct CardInput {
    pub number: String,
    pub exp_month: u32,
    /// Two- or four-digit year.
    pub exp_year: u32,
    pub cvc: String,
}

impl fmt::Debug for CardInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardInput")
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardField {
    Number,
    Expiry,
    Cvc,
}

/// Inline validation error for one card field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: CardField,
    pub message: &'static str,
}

fn digits(s: &str) -> Option<String> {
    let cleaned: String = s.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    cleaned.chars().all(|c| c.is_ascii_digit()).then_some(cleaned)
}

/// Luhn checksum over an all-digit string.
fn luhn(number: &str) -> bool {
    let sum: u32 = number
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn full_year(year: u32) -> u32 {
    if year < 100 { 2000 + year } else { year }
}

/// Validate card fields as of `today`.
pub fn validate_card_at(input: &CardInput, today: NaiveDate) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match digits(&input.number) {
        Some(n) if (12..=19).contains(&n.len()) && luhn(&n) => {}
        _ => errors.push(FieldError {
            field: CardField::Number,
            message: "Your card number is invalid.",
        }),
    }

    let year = full_year(input.exp_year);
    let month_ok = (1..=12).contains(&input.exp_month);
    let not_past = (year, input.exp_month) >= (today.year() as u32, today.month());
    if !month_ok || !not_past || year > today.year() as u32 + 20 {
        errors.push(FieldError {
            field: CardField::Expiry,
            message: "Your card's expiration date is invalid.",
        });
    }

    match digits(&input.cvc) {
        Some(c) if (3..=4).contains(&c.len()) => {}
        _ => errors.push(FieldError {
            field: CardField::Cvc,
            message: "Your card's security code is invalid.",
        }),
    }

    errors
}

pub fn validate_card(input: &CardInput) -> Vec<FieldError> {
    validate_card_at(input, Utc::now().date_naive())
}

/// Card fields mounted into a host container.
pub struct CardElement {
    id: ElementId,
    container: String,
    gateway: Arc<dyn PaymentGateway>,
    input: Option<CardInput>,
    field_errors: Vec<FieldError>,
    error: Option<String>,
}

impl CardElement {
    pub fn mount(container: impl Into<String>, gateway: Arc<dyn PaymentGateway>) -> Self {
        let element = Self {
            id: ElementId::fresh(),
            container: container.into(),
            gateway,
            input: None,
            field_errors: Vec::new(),
            error: None,
        };
        debug!("mounted card element {} into #{}", element.id, element.container);
        element
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Record new field values and return inline errors. Nothing is sent.
    pub fn input(&mut self, input: CardInput) -> &[FieldError] {
        self.field_errors = validate_card(&input);
        self.input = Some(input);
        &self.field_errors
    }

    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    pub fn is_complete(&self) -> bool {
        self.input.is_some() && self.field_errors.is_empty()
    }
}

#[async_trait]
impl CaptureElement for CardElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn method(&self) -> CaptureMethod {
        CaptureMethod::Card
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn flag_error(&mut self, message: String) {
        self.error = Some(message);
    }

    async fn tokenize(
        &mut self,
        billing: &BillingDetails,
        _amount: &Money,
    ) -> CheckoutResult<PaymentMethodToken> {
        refuse_flagged(self.error())?;

        let input = match (&self.input, self.field_errors.first()) {
            (Some(input), None) => input.clone(),
            (None, _) => return Err(CheckoutError::Card("Your card details are incomplete.".into())),
            (Some(_), Some(err)) => return Err(CheckoutError::Card(err.message.to_string())),
        };

        let request = CreatePaymentMethodRequest {
            card: CardDetails {
                number: digits(&input.number).unwrap_or_default(),
                exp_month: input.exp_month,
                exp_year: full_year(input.exp_year),
                cvc: input.cvc,
            },
            billing_details: billing.clone(),
        };

        match self.gateway.create_payment_method(request).await {
            Ok(token) => Ok(token),
            Err(e) => {
                let err = CheckoutError::from(e);
                if matches!(err, CheckoutError::Card(_)) {
                    self.flag_error(err.to_string());
                }
                Err(err)
            }
        }
    }

    fn remount(&self) -> Box<dyn CaptureElement> {
        Box::new(CardElement::mount(self.container.clone(), self.gateway.clone()))
    }

    fn as_card_mut(&mut self) -> Option<&mut CardElement> {
        Some(self)
    }
}

// ============================================================================
// Wallet
// ============================================================================

/// Device wallet button.
pub struct WalletElement {
    id: ElementId,
    support: Arc<dyn WalletSupport>,
    availability: Option<WalletAvailability>,
    error: Option<String>,
}

impl WalletElement {
    pub fn mount(support: Arc<dyn WalletSupport>) -> Self {
        Self {
            id: ElementId::fresh(),
            support,
            availability: None,
            error: None,
        }
    }

    /// Ask the device whether it can pay. The answer is cached.
    pub async fn check_availability(&mut self, amount: &Money) -> &WalletAvailability {
        if self.availability.is_none() {
            let availability = self.support.availability(amount).await;
            if let WalletAvailability::Unavailable { reason } = &availability {
                info!("wallet unavailable: {}", reason);
            }
            self.availability = Some(availability);
        }
        self.availability.get_or_insert(WalletAvailability::Available)
    }

    pub fn availability(&self) -> Option<&WalletAvailability> {
        self.availability.as_ref()
    }
}

#[async_trait]
impl CaptureElement for WalletElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn method(&self) -> CaptureMethod {
        CaptureMethod::Wallet
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn flag_error(&mut self, message: String) {
        self.error = Some(message);
    }

    async fn tokenize(
        &mut self,
        _billing: &BillingDetails,
        amount: &Money,
    ) -> CheckoutResult<PaymentMethodToken> {
        refuse_flagged(self.error())?;

        if let WalletAvailability::Unavailable { reason } = self.check_availability(amount).await {
            return Err(CheckoutError::Validation(reason.clone()));
        }

        match self.support.request_token(amount).await {
            Ok(token) => Ok(token),
            Err(err) => {
                if matches!(err, CheckoutError::Card(_)) {
                    self.flag_error(err.to_string());
                }
                Err(err)
            }
        }
    }

    fn remount(&self) -> Box<dyn CaptureElement> {
        Box::new(WalletElement {
            id: ElementId::fresh(),
            support: self.support.clone(),
            availability: self.availability.clone(),
            error: None,
        })
    }
}

// ============================================================================
// Session
// ============================================================================

/// The element currently mounted in the payment form.
pub struct CaptureSession {
    element: Box<dyn CaptureElement>,
    last_error: Option<String>,
    resets: u32,
}

impl CaptureSession {
    pub fn new(element: Box<dyn CaptureElement>) -> Self {
        Self {
            element,
            last_error: None,
            resets: 0,
        }
    }

    pub fn card(container: impl Into<String>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::new(Box::new(CardElement::mount(container, gateway)))
    }

    pub fn wallet(element: WalletElement) -> Self {
        Self::new(Box::new(element))
    }

    pub fn method(&self) -> CaptureMethod {
        self.element.method()
    }

    pub fn element_id(&self) -> ElementId {
        self.element.id()
    }

    /// Error that caused the last reset, for display above the new element.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub async fn tokenize(
        &mut self,
        billing: &BillingDetails,
        amount: &Money,
    ) -> CheckoutResult<PaymentMethodToken> {
        let token = self.element.tokenize(billing, amount).await?;
        self.last_error = None;
        Ok(token)
    }

    /// Destroy the mounted element and mount a fresh one.
    pub fn reset(&mut self, cause: &CheckoutError) {
        let old = self.element.id();
        self.element = self.element.remount();
        self.last_error = Some(cause.user_message());
        self.resets += 1;
        debug!("capture element {} replaced by {}", old, self.element.id());
    }
}

impl CaptureSession {
    /// The mounted card element, when paying by card.
    pub fn card_element(&mut self) -> Option<&mut CardElement> {
        self.element.as_card_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn card(number: &str, month: u32, year: u32, cvc: &str) -> CardInput {
        CardInput {
            number: number.into(),
            exp_month: month,
            exp_year: year,
            cvc: cvc.into(),
        }
    }

    #[test]
    fn test_luhn() {
        assert!(luhn("4242424242424242"));
        assert!(luhn("5555555555554444"));
        assert!(!luhn("4242424242424241"));
    }

    #[test]
    fn test_valid_card_has_no_errors() {
        let errors = validate_card_at(&card("4242 4242 4242 4242", 12, 30, "123"), today());
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_inline_errors() {
        let errors = validate_card_at(&card("4242424242424241", 13, 2030, "12"), today());
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![CardField::Number, CardField::Expiry, CardField::Cvc]);
    }

    #[test]
    fn test_expiry_boundaries() {
        assert!(validate_card_at(&card("4242424242424242", 10, 2026, "123"), today()).is_empty());
        let errors = validate_card_at(&card("4242424242424242", 9, 2026, "123"), today());
        assert_eq!(errors[0].field, CardField::Expiry);
    }

    #[test]
    fn test_refuse_flagged() {
        assert!(refuse_flagged(None).is_ok());
        assert!(matches!(
            refuse_flagged(Some("declined")),
            Err(CheckoutError::Validation(_))
        ));
    }

    #[test]
    fn test_element_id_display() {
        let id = ElementId::fresh();
        assert!(id.to_string().starts_with("el_"));
        assert_ne!(id, ElementId::fresh());
    }
}
