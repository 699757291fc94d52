// Checkout configuration validation

use crate::{ConfigError, Result};
use std::fmt::Display;

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Field-level validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within an inclusive range
    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate that a value is strictly greater than zero
    pub fn positive<T: PartialOrd + Default + Display>(value: T, field: &str) -> Result<()> {
        if value <= T::default() {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero, got {}",
                field, value
            )));
        }
        Ok(())
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of<T: PartialEq + Display>(value: &T, allowed: &[T], field: &str) -> Result<()> {
        if !allowed.contains(value) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be one of the allowed values, got {}",
                field, value
            )));
        }
        Ok(())
    }

    /// Validate URL format
    pub fn is_url(value: &str, field: &str) -> Result<()> {
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid URL",
                field
            )));
        }
        Ok(())
    }

    /// Validate an API path (`/api/...`)
    pub fn is_path(value: &str, field: &str) -> Result<()> {
        if !value.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "{} must start with '/'",
                field
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("pk_test", "field").is_ok());
        assert!(ConfigValidator::not_empty("  ", "field").is_err());
    }

    #[test]
    fn test_range_validation() {
        assert!(ConfigValidator::in_range(2, 0, 10, "field").is_ok());
        let err = ConfigValidator::in_range(11, 0, 10, "max_intent_retries").unwrap_err();
        assert!(err.to_string().contains("between 0 and 10"));
    }

    #[test]
    fn test_positive_decimal() {
        assert!(ConfigValidator::positive(Decimal::new(11988, 2), "price").is_ok());
        assert!(ConfigValidator::positive(Decimal::ZERO, "price").is_err());
    }

    #[test]
    fn test_url_and_path_validation() {
        assert!(ConfigValidator::is_url("https://api.stripe.com/v1", "field").is_ok());
        assert!(ConfigValidator::is_url("api.stripe.com", "field").is_err());
        assert!(ConfigValidator::is_path("/api/users/login", "field").is_ok());
        assert!(ConfigValidator::is_path("api/users/login", "field").is_err());
    }

    #[test]
    fn test_one_of() {
        let allowed = ["usd", "eur"];
        assert!(ConfigValidator::one_of(&"usd", &allowed, "currency").is_ok());
        assert!(ConfigValidator::one_of(&"btc", &allowed, "currency").is_err());
    }
}
