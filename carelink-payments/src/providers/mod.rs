//! Payment gateway implementations

#[cfg(feature = "stripe")]
pub mod stripe;

#[cfg(feature = "stripe")]
pub use stripe::StripeGateway;
