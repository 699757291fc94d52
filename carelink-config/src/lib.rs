// Configuration for the carelink membership checkout

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use carelink_log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Annual membership price in major currency units.
pub const DEFAULT_MEMBERSHIP_PRICE: Decimal = Decimal::from_parts(11988, 0, 0, false, 2);

/// Currencies the backend is able to create intents in.
pub const SUPPORTED_CURRENCIES: [&str; 4] = ["usd", "eur", "gbp", "cad"];

/// Backend API paths, relative to `api_base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub signup: String,
    pub login: String,
    pub promo_validate: String,
    pub create_intent: String,
    pub subscription_email: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            signup: "/api/users/signup".to_string(),
            login: "/api/users/login".to_string(),
            promo_validate: "/api/promo-codes/validate".to_string(),
            create_intent: "/api/payments/create-payment-intent".to_string(),
            subscription_email: "/api/emails/subscription-confirmation".to_string(),
        }
    }
}

/// Everything the checkout needs to talk to the backend and the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Base URL of the directory backend.
    pub api_base_url: String,
    /// Base URL of the payment gateway REST API.
    pub gateway_base_url: String,
    /// Publishable gateway key used for client-side calls.
    pub publishable_key: String,
    /// Lowercase ISO 4217 code.
    pub currency: String,
    /// Yearly membership price before discounts.
    pub membership_price: Decimal,
    /// Retries after the first failed intent creation.
    pub max_intent_retries: u32,
    /// Delay unit; retry `k` waits `k * intent_retry_delay_ms`.
    pub intent_retry_delay_ms: u64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    pub endpoints: Endpoints,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            gateway_base_url: "https://api.stripe.com/v1".to_string(),
            publishable_key: String::new(),
            currency: "usd".to_string(),
            membership_price: DEFAULT_MEMBERSHIP_PRICE,
            max_intent_retries: 2,
            intent_retry_delay_ms: 1000,
            request_timeout_secs: 30,
            endpoints: Endpoints::default(),
        }
    }
}

fn parse_field<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl CheckoutConfig {
    /// Load from `.env` (if present) and `CARELINK_*` variables, then validate.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("loaded {}", path.display());
        }
        let vars = EnvLoader::carelink().load()?;
        let config = Self::from_vars(&vars)?;
        config.validate()?;
        info!(
            "checkout config loaded: api={} gateway={} currency={}",
            config.api_base_url, config.gateway_base_url, config.currency
        );
        Ok(config)
    }

    /// Load a JSON, TOML or `.env` file chosen by extension, then validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let loader = ConfigLoader::auto(path)?;
        let value = loader.load_file(path)?;

        let config = match loader.format() {
            FileFormat::Env => {
                let vars: HashMap<String, String> = serde_json::from_value(value)
                    .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
                Self::from_vars(&vars)?
            }
            FileFormat::Json | FileFormat::Toml => serde_json::from_value(value)
                .map_err(|e| ConfigError::DeserializationError(e.to_string()))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Overlay flat, lowercased keys (as produced by [`EnvLoader`]) on the defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        for (key, value) in vars {
            match key.as_str() {
                "api_base_url" => config.api_base_url = value.trim_end_matches('/').to_string(),
                "gateway_base_url" => {
                    config.gateway_base_url = value.trim_end_matches('/').to_string()
                }
                "publishable_key" => config.publishable_key = value.clone(),
                "currency" => config.currency = value.to_lowercase(),
                "membership_price" => config.membership_price = parse_field(key, value)?,
                "max_intent_retries" => config.max_intent_retries = parse_field(key, value)?,
                "intent_retry_delay_ms" => config.intent_retry_delay_ms = parse_field(key, value)?,
                "request_timeout_secs" => config.request_timeout_secs = parse_field(key, value)?,
                "signup_path" => config.endpoints.signup = value.clone(),
                "login_path" => config.endpoints.login = value.clone(),
                "promo_validate_path" => config.endpoints.promo_validate = value.clone(),
                "create_intent_path" => config.endpoints.create_intent = value.clone(),
                "subscription_email_path" => config.endpoints.subscription_email = value.clone(),
                _ => {}
            }
        }

        Ok(config)
    }

    /// Absolute URL for a backend path.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

impl Validate for CheckoutConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_url(&self.api_base_url, "api_base_url")?;
        ConfigValidator::is_url(&self.gateway_base_url, "gateway_base_url")?;
        ConfigValidator::not_empty(&self.publishable_key, "publishable_key")?;
        ConfigValidator::one_of(&self.currency.as_str(), &SUPPORTED_CURRENCIES, "currency")?;
        ConfigValidator::positive(self.membership_price, "membership_price")?;
        ConfigValidator::in_range(self.max_intent_retries, 0, 10, "max_intent_retries")?;
        ConfigValidator::positive(self.request_timeout_secs, "request_timeout_secs")?;
        ConfigValidator::is_path(&self.endpoints.signup, "endpoints.signup")?;
        ConfigValidator::is_path(&self.endpoints.login, "endpoints.login")?;
        ConfigValidator::is_path(&self.endpoints.promo_validate, "endpoints.promo_validate")?;
        ConfigValidator::is_path(&self.endpoints.create_intent, "endpoints.create_intent")?;
        ConfigValidator::is_path(
            &self.endpoints.subscription_email,
            "endpoints.subscription_email",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = CheckoutConfig::default();
        assert_eq!(config.membership_price.to_string(), "119.88");
        assert_eq!(config.max_intent_retries, 2);
        assert_eq!(config.intent_retry_delay_ms, 1000);
        assert_eq!(config.currency, "usd");
    }

    #[test]
    fn test_default_requires_publishable_key() {
        let err = CheckoutConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("publishable_key"));
    }

    #[test]
    fn test_from_vars_overlays_defaults() {
        let config = CheckoutConfig::from_vars(&vars(&[
            ("api_base_url", "https://directory.example.org/"),
            ("publishable_key", "pk_test_abc"),
            ("max_intent_retries", "3"),
            ("membership_price", "99.00"),
            ("login_path", "/api/v2/login"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://directory.example.org");
        assert_eq!(config.max_intent_retries, 3);
        assert_eq!(config.membership_price, Decimal::new(9900, 2));
        assert_eq!(config.endpoints.login, "/api/v2/login");
        assert_eq!(config.api_url("/x"), "https://directory.example.org/x");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vars_rejects_garbage_numbers() {
        let err = CheckoutConfig::from_vars(&vars(&[("intent_retry_delay_ms", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "intent_retry_delay_ms"));
    }

    #[test]
    fn test_unsupported_currency() {
        let config = CheckoutConfig {
            publishable_key: "pk_test".into(),
            currency: "btc".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
