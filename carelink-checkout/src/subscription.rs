//! Pending membership subscription
//!
//! Holds the priced membership for one checkout together with the last intent
//! obtained for it. The intent is tagged with the amount it was created for;
//! once the price moves away from that amount the intent is stale and must be
//! replaced before confirmation.

use carelink_log::debug;
use carelink_payments::{Currency, Money, Quote, pricing};
use rust_decimal::Decimal;

use crate::error::CheckoutResult;
use crate::services::IntentHandle;

#[derive(Debug, Clone)]
pub struct PendingSubscription {
    user_id: String,
    currency: Currency,
    quote: Quote,
    intent: Option<IntentHandle>,
}

impl PendingSubscription {
    /// Start an undiscounted subscription for `user_id`.
    pub fn new(user_id: impl Into<String>, base: Decimal, currency: Currency) -> CheckoutResult<Self> {
        Ok(Self {
            user_id: user_id.into(),
            currency,
            quote: pricing::price(base, Decimal::ZERO)?,
            intent: None,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    pub fn discount_percent(&self) -> Decimal {
        self.quote.discount_percent
    }

    pub fn final_amount(&self) -> Decimal {
        self.quote.final_amount
    }

    /// Final amount in minor units.
    pub fn amount(&self) -> CheckoutResult<Money> {
        Ok(self.quote.to_money(self.currency)?)
    }

    /// Reprice with a new discount. On error the previous quote is kept.
    pub fn apply_discount(&mut self, discount_percent: Decimal) -> CheckoutResult<&Quote> {
        self.quote = pricing::price(self.quote.base, discount_percent)?;
        debug!(
            "repriced membership: {}% off -> {}",
            discount_percent, self.quote.final_amount
        );
        Ok(&self.quote)
    }

    /// Drop any discount. The current intent is left alone.
    pub fn reset_discount(&mut self) {
        if let Ok(quote) = pricing::price(self.quote.base, Decimal::ZERO) {
            self.quote = quote;
        }
    }

    pub fn intent(&self) -> Option<&IntentHandle> {
        self.intent.as_ref()
    }

    /// The current intent, if it was created for the current final amount.
    pub fn usable_intent(&self) -> CheckoutResult<Option<&IntentHandle>> {
        let amount = self.amount()?;
        Ok(self.intent.as_ref().filter(|intent| intent.amount == amount))
    }

    pub fn is_intent_stale(&self) -> CheckoutResult<bool> {
        Ok(self.intent.is_some() && self.usable_intent()?.is_none())
    }

    pub fn attach_intent(&mut self, intent: IntentHandle) {
        self.intent = Some(intent);
    }

    pub fn discard_intent(&mut self) -> Option<IntentHandle> {
        self.intent.take()
    }
}
