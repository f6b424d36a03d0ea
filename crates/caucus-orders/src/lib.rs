//! The order fulfillment pipeline.
//!
//! A checkout creates a `pending` order and a payment intent; the gateway's
//! signed webhook completes or fails it; a completed order is assembled into
//! a CSV export, stored, and announced to the buyer by email.
//!
//! Everything here talks to the outside world through the traits in
//! [`caucus_core`], so the gateway, storage, and mailer can be swapped for
//! fakes in tests.

pub mod assembler;
pub mod error;
pub mod export;
pub mod local;
pub mod machine;
pub mod marketplace;
pub mod notify;
pub mod webhook;

pub use error::Error;
pub use marketplace::{Backend, MarketConfig, Marketplace, WebhookOutcome};

#[cfg(test)]
mod tests;
