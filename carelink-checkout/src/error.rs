//! Checkout error taxonomy

use carelink_config::ConfigError;
use carelink_payments::{PaymentError, RetryError, Retryable};
use thiserror::Error;

/// Result type for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Broad class of a [`CheckoutError`], used by the host UI to pick how a
/// failure is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected locally; shown inline next to the field.
    Validation,
    /// Request rejected by the server (400/401/403); never retried.
    Client,
    /// Network failure or server error; may succeed if repeated.
    Transient,
    /// Card rejected or declined; the capture element is reset.
    Card,
    /// Payment could not be completed.
    Payment,
    /// Submission refused because of the checkout's own state.
    Flow,
}

/// Checkout errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckoutError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request rejected: {0}")]
    Client(String),

    #[error("Temporary failure: {0}")]
    Transient(String),

    #[error("Card error: {0}")]
    Card(String),

    #[error("Payment failed: {0}")]
    Payment(String),

    /// Intent creation failed on every allowed attempt.
    #[error("Could not initialize payment after {attempts} attempts: {last}")]
    IntentUnavailable { attempts: u32, last: String },

    #[error("A payment is already being submitted")]
    AlreadySubmitting,

    #[error("Checkout was closed")]
    ModalClosed,
}

impl CheckoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Client(_) => ErrorKind::Client,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Card(_) => ErrorKind::Card,
            Self::Payment(_) | Self::IntentUnavailable { .. } => ErrorKind::Payment,
            Self::AlreadySubmitting | Self::ModalClosed => ErrorKind::Flow,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Message suitable for showing to the member.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transient(_) => "Something went wrong on our side. Please try again.".into(),
            Self::IntentUnavailable { .. } => {
                "We could not initialize your payment. Please try again later.".into()
            }
            Self::Card(message) | Self::Validation(message) | Self::Client(message) => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

impl Retryable for CheckoutError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<PaymentError> for CheckoutError {
    fn from(err: PaymentError) -> Self {
        match &err {
            e if e.is_card_error() => Self::Card(e.user_message()),
            e if e.is_transient() => Self::Transient(e.to_string()),
            PaymentError::InvalidRequest(msg) | PaymentError::Authentication(msg) => {
                Self::Client(msg.clone())
            }
            PaymentError::Validation(msg) | PaymentError::InvalidAmount(msg) => {
                Self::Validation(msg.clone())
            }
            _ => Self::Payment(err.to_string()),
        }
    }
}

impl From<RetryError<CheckoutError>> for CheckoutError {
    fn from(err: RetryError<CheckoutError>) -> Self {
        match err {
            RetryError::Aborted { error, .. } => error,
            RetryError::Exhausted { attempts, last } => Self::IntentUnavailable {
                attempts,
                last: last.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CheckoutError {
    fn from(err: ConfigError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Payment(format!("unexpected response: {}", err))
        } else {
            Self::Transient(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_payments::DeclineCode;

    #[test]
    fn test_payment_error_mapping() {
        let declined = PaymentError::CardDeclined {
            code: DeclineCode::InsufficientFunds,
            message: "raw".into(),
        };
        assert_eq!(
            CheckoutError::from(declined),
            CheckoutError::Card("Your card has insufficient funds.".into())
        );
        assert_eq!(
            CheckoutError::from(PaymentError::Network("reset".into())).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            CheckoutError::from(PaymentError::Authentication("bad key".into())).kind(),
            ErrorKind::Client
        );
        assert_eq!(
            CheckoutError::from(PaymentError::Serialization("eof".into())).kind(),
            ErrorKind::Payment
        );
    }

    #[test]
    fn test_retry_error_mapping() {
        let exhausted = RetryError::Exhausted {
            attempts: 3,
            last: CheckoutError::Transient("502".into()),
        };
        assert!(matches!(
            CheckoutError::from(exhausted),
            CheckoutError::IntentUnavailable { attempts: 3, .. }
        ));

        let aborted = RetryError::Aborted {
            attempts: 1,
            error: CheckoutError::Client("expired".into()),
        };
        assert_eq!(
            CheckoutError::from(aborted),
            CheckoutError::Client("expired".into())
        );
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(CheckoutError::Transient("x".into()).is_retryable());
        assert!(!CheckoutError::Client("x".into()).is_retryable());
        assert!(!CheckoutError::AlreadySubmitting.is_retryable());
        assert_eq!(CheckoutError::ModalClosed.kind(), ErrorKind::Flow);
    }
}
