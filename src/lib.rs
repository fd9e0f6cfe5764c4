//! Payment-confirmation reconciliation for QR bank-transfer payments.
//!
//! A [`PaymentSession`](application::session::PaymentSession) creates a payment
//! intent, then races a polling loop against the intent's wall-clock expiry
//! until the payment is confirmed, fails, expires or is cancelled.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod logging;
