//! Error taxonomy shared by every Caucus crate.

use thiserror::Error;

use crate::order::OrderStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing or malformed required input.
  #[error("invalid input: {0}")]
  Validation(String),

  /// The order does not exist, or is not in the state the operation needs.
  #[error("order {0} not found or not in the expected state")]
  NotFoundOrNotCompleted(i64),

  #[error("{service} unavailable: {message}")]
  UpstreamUnavailable {
    service: &'static str,
    message: String,
  },

  #[error("webhook signature rejected: {0}")]
  SignatureInvalid(String),

  /// A completed order resolved to zero contacts.
  #[error("order {0} resolved to zero contacts")]
  EmptyResultSet(i64),

  #[error(
    "order {order_id} is already {current}; refusing transition to {attempted}"
  )]
  AnomalousTransition {
    order_id:  i64,
    current:   OrderStatus,
    attempted: OrderStatus,
  },

  #[error("payment bypass is disabled")]
  BypassDisabled,

  /// A stored row could not be decoded into a domain type.
  #[error("stored data could not be decoded: {0}")]
  DataIntegrity(String),
}

impl Error {
  pub fn upstream(service: &'static str, err: impl std::fmt::Display) -> Self {
    Self::UpstreamUnavailable { service, message: err.to_string() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
