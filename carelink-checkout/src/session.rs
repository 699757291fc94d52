//! Authenticated member session

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::error::{CheckoutError, CheckoutResult};

/// Session returned by signup or login.
///
/// Passed explicitly to every backend call; nothing reads it from ambient
/// storage.
#[derive(Clone)]
pub struct AuthSession {
    user_id: String,
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: SecretString::from(token.into()),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Bearer token for backend requests.
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Fail with a client error when the token is missing or expired.
    pub fn ensure_usable(&self) -> CheckoutResult<()> {
        if self.token().is_empty() {
            return Err(CheckoutError::Client("missing auth token".into()));
        }
        if self.is_expired() {
            return Err(CheckoutError::Client("auth session expired".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("token", &carelink_log::redact(self.token()))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_without_expiry_is_usable() {
        let session = AuthSession::new("u_1", "tok_abcdef");
        assert!(session.ensure_usable().is_ok());
        assert!(!session.is_expired());
    }

    #[test]
    fn test_expired_session_is_client_error() {
        let session =
            AuthSession::new("u_1", "tok_abcdef").with_expiry(Utc::now() - Duration::minutes(1));
        assert!(matches!(
            session.ensure_usable(),
            Err(CheckoutError::Client(_))
        ));
    }

    #[test]
    fn test_empty_token_rejected() {
        let session = AuthSession::new("u_1", "");
        assert!(session.ensure_usable().is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let session = AuthSession::new("u_1", "tok_verysecret");
        let printed = format!("{:?}", session);
        assert!(printed.contains("u_1"));
        assert!(!printed.contains("verysecret"));
    }
}
