//! Membership pricing and promo discounts.
//!
//! Pricing is pure: a base price and a discount percentage in `[0, 100]`
//! produce a [`Quote`]. The discount is rounded to the minor unit first and
//! the final amount is derived by subtraction, so
//! `discount_amount + final_amount == base` holds exactly for every input.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, PaymentResult};
use crate::money::{Currency, Money};

/// Yearly membership price in USD.
pub const MEMBERSHIP_BASE_PRICE: Decimal = Decimal::from_parts(11988, 0, 0, false, 2);

const MINOR_UNIT_DP: u32 = 2;

/// A priced membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub base: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
}

impl Quote {
    /// Final amount in minor units, ready for an intent request.
    pub fn to_money(&self, currency: Currency) -> PaymentResult<Money> {
        Money::from_decimal(self.final_amount, currency)
    }

    pub fn is_discounted(&self) -> bool {
        self.discount_amount > Decimal::ZERO
    }
}

/// Price `base` after a `discount_percent` discount.
pub fn price(base: Decimal, discount_percent: Decimal) -> PaymentResult<Quote> {
    if base.is_sign_negative() {
        return Err(PaymentError::Validation(format!(
            "base price must not be negative, got {}",
            base
        )));
    }
    validate_discount(discount_percent)?;

    let discount_amount = (base * discount_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::MidpointAwayFromZero);

    Ok(Quote {
        base,
        discount_percent,
        discount_amount,
        final_amount: base - discount_amount,
    })
}

/// Reject discounts outside `[0, 100]`.
pub fn validate_discount(discount_percent: Decimal) -> PaymentResult<()> {
    if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
        return Err(PaymentError::Validation(format!(
            "discount percent must be within 0..=100, got {}",
            discount_percent
        )));
    }
    Ok(())
}
