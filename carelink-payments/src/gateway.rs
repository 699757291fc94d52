//! Payment gateway trait and common HTTP plumbing

use crate::error::{PaymentError, PaymentResult};
use crate::types::{ClientSecret, CreatePaymentMethodRequest, PaymentIntent, PaymentMethodToken};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Client-side operations against a payment gateway.
///
/// Only calls authorized by the publishable key and an intent's client
/// secret live here; intent creation goes through the backend.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Get gateway name
    fn name(&self) -> &'static str;

    /// Tokenize card data into a payment method.
    async fn create_payment_method(
        &self,
        request: CreatePaymentMethodRequest,
    ) -> PaymentResult<PaymentMethodToken>;

    /// Confirm an intent with a payment method.
    async fn confirm_intent(
        &self,
        client_secret: &ClientSecret,
        payment_method: &PaymentMethodToken,
    ) -> PaymentResult<PaymentIntent>;

    /// Fetch the current state of an intent.
    async fn retrieve_intent(&self, client_secret: &ClientSecret) -> PaymentResult<PaymentIntent>;
}

/// Form-encoding HTTP client authenticated with a gateway key
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl ProviderClient {
    /// Create a new provider client
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> PaymentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("carelink-payments/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key.into()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET request with query parameters
    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> PaymentResult<reqwest::Response> {
        let mut url = url::Url::parse(&format!("{}{}", self.base_url, path))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }

        Ok(self
            .client
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?)
    }

    /// POST request with form body and an idempotency key
    pub async fn post_form<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> PaymentResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        Ok(self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .form(body)
            .send()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client =
            ProviderClient::new("https://api.stripe.com/v1/", "pk_test", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.base_url(), "https://api.stripe.com/v1");
    }
}
