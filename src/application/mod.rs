//! Application layer containing the payment reconciliation engine.
//!
//! `PaymentSession` is the entry point integrators drive. It owns a
//! `CountdownTimer` and a `PollingEngine` per payment intent and uses an
//! actor-like pattern with `tokio` channels so that all state mutation happens
//! on a single task.

pub mod countdown;
pub mod poller;
pub mod session;
pub mod timer;
