//! Error types for payment processing

use thiserror::Error;

/// Payment error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    /// Card declined by the issuer
    #[error("Card declined: {message}")]
    CardDeclined {
        /// Issuer decline reason
        code: DeclineCode,
        /// Gateway message
        message: String,
    },

    /// Card data rejected before reaching the issuer
    #[error("Invalid card: {0}")]
    InvalidCard(String),

    /// Expired card
    #[error("Card expired")]
    CardExpired,

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Request rejected by the gateway (HTTP 400/404)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (HTTP 401/403)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Rate limited
    #[error("Rate limited by gateway")]
    RateLimited,

    /// Gateway-side failure (HTTP 5xx)
    #[error("Gateway error ({status}): {message}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Gateway message
        message: String,
    },

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Errors caused by the card itself; the user must correct and resubmit.
    pub fn is_card_error(&self) -> bool {
        matches!(
            self,
            Self::CardDeclined { .. } | Self::InvalidCard(_) | Self::CardExpired
        )
    }

    /// Errors worth retrying with the same input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited | Self::Provider { .. }
        )
    }

    /// Message suitable for showing inline next to the payment form.
    pub fn user_message(&self) -> String {
        match self {
            Self::CardDeclined { code, .. } => code.message().to_string(),
            Self::CardExpired => DeclineCode::ExpiredCard.message().to_string(),
            Self::InvalidCard(message) => message.clone(),
            Self::Network(_) | Self::RateLimited | Self::Provider { .. } => {
                "We could not reach the payment processor. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Classify a non-success gateway response.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 404 => Self::InvalidRequest(message),
            401 | 403 => Self::Authentication(message),
            402 => Self::CardDeclined {
                code: DeclineCode::GenericDecline,
                message,
            },
            429 => Self::RateLimited,
            _ => Self::Provider { status, message },
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PaymentError::Serialization(err.to_string())
        } else {
            PaymentError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        PaymentError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for PaymentError {
    fn from(err: url::ParseError) -> Self {
        PaymentError::Config(format!("invalid gateway URL: {}", err))
    }
}

/// Result type for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Decline code for card errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineCode {
    GenericDecline,
    InsufficientFunds,
    LostCard,
    StolenCard,
    ExpiredCard,
    IncorrectCvc,
    ProcessingError,
    IncorrectNumber,
    AuthenticationRequired,
    Fraudulent,
    Unknown,
}

impl DeclineCode {
    /// Parse a gateway decline or error code.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "generic_decline" | "do_not_honor" | "card_declined" => Self::GenericDecline,
            "insufficient_funds" => Self::InsufficientFunds,
            "lost_card" => Self::LostCard,
            "stolen_card" => Self::StolenCard,
            "expired_card" => Self::ExpiredCard,
            "incorrect_cvc" | "invalid_cvc" => Self::IncorrectCvc,
            "processing_error" => Self::ProcessingError,
            "incorrect_number" | "invalid_number" => Self::IncorrectNumber,
            "authentication_required" | "payment_intent_authentication_failure" => {
                Self::AuthenticationRequired
            }
            "fraudulent" => Self::Fraudulent,
            _ => Self::Unknown,
        }
    }

    /// Get user-friendly message
    pub fn message(&self) -> &'static str {
        match self {
            Self::GenericDecline => "Your card was declined. Please try another card.",
            Self::InsufficientFunds => "Your card has insufficient funds.",
            Self::LostCard => "This card has been reported lost.",
            Self::StolenCard => "This card has been reported stolen.",
            Self::ExpiredCard => "Your card has expired.",
            Self::IncorrectCvc => "The CVC code is incorrect.",
            Self::ProcessingError => "There was an error processing your card. Please try again.",
            Self::IncorrectNumber => "The card number is incorrect.",
            Self::AuthenticationRequired => {
                "Your bank could not authenticate this payment. Please try again."
            }
            Self::Fraudulent => "This transaction has been flagged as potentially fraudulent.",
            Self::Unknown => "Your card was declined. Please contact your bank.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            PaymentError::from_status(400, "bad"),
            PaymentError::InvalidRequest(_)
        ));
        assert!(matches!(
            PaymentError::from_status(403, "nope"),
            PaymentError::Authentication(_)
        ));
        assert!(PaymentError::from_status(402, "declined").is_card_error());
        assert!(PaymentError::from_status(503, "down").is_transient());
        assert!(PaymentError::from_status(429, "slow down").is_transient());
        assert!(!PaymentError::from_status(401, "key").is_transient());
    }

    #[test]
    fn test_decline_code_parse() {
        assert_eq!(DeclineCode::parse("insufficient_funds"), DeclineCode::InsufficientFunds);
        assert_eq!(DeclineCode::parse("INVALID_CVC"), DeclineCode::IncorrectCvc);
        assert_eq!(DeclineCode::parse("who_knows"), DeclineCode::Unknown);
    }

    #[test]
    fn test_user_message_prefers_decline_text() {
        let err = PaymentError::CardDeclined {
            code: DeclineCode::InsufficientFunds,
            message: "Your card has insufficient funds. (raw)".into(),
        };
        assert_eq!(err.user_message(), "Your card has insufficient funds.");
    }
}
