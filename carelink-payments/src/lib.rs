//! Payments for the carelink membership checkout
//!
//! Pricing, money, and the client-side half of the payment gateway.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      carelink-payments                       │
//! │                                                              │
//! │  pricing::price(base, discount%) ──► Quote ──► Money         │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │               PaymentGateway (trait)                   │  │
//! │  │  create_payment_method | confirm_intent | retrieve     │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                          │                                   │
//! │                   ┌──────┴──────┐                            │
//! │                   │   Stripe    │  (publishable key)         │
//! │                   └─────────────┘                            │
//! │                                                              │
//! │  RetryConfig::run ── linear / exponential backoff            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use carelink_payments::{pricing, Currency, StripeGateway, PaymentGateway};
//!
//! let quote = pricing::price(pricing::MEMBERSHIP_BASE_PRICE, 25.into())?;
//! let amount = quote.to_money(Currency::USD)?; // $89.91
//!
//! let gateway = StripeGateway::new("pk_test_...")?;
//! let intent = gateway.confirm_intent(&client_secret, &payment_method).await?;
//! ```

pub mod error;
pub mod gateway;
pub mod money;
pub mod pricing;
pub mod retry;
pub mod types;

pub mod providers;

pub use error::*;
pub use gateway::*;
pub use money::*;
pub use pricing::{MEMBERSHIP_BASE_PRICE, Quote};
pub use retry::*;
pub use types::*;

#[cfg(feature = "stripe")]
pub use providers::StripeGateway;
