//! Contracts for the external collaborators: payment gateway, object
//! storage, and email delivery.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::Result;

// ─── Payment gateway ─────────────────────────────────────────────────────────

/// Correlation data attached to a payment intent and echoed back on every
/// webhook for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentMetadata {
  #[serde(rename = "orderId")]
  pub order_id:      String,
  /// Older intents carry `userId`.
  #[serde(rename = "buyerId", alias = "userId")]
  pub buyer_id:      String,
  #[serde(rename = "contactCount")]
  pub contact_count: String,
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
  /// Minor currency units.
  pub amount:   i64,
  pub currency: String,
  pub metadata: IntentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
  pub id:            String,
  /// Handed to the buyer's browser to confirm the payment.
  pub client_secret: String,
}

pub trait PaymentGateway: Send + Sync {
  fn create_intent<'a>(
    &'a self,
    request: &'a IntentRequest,
  ) -> impl Future<Output = Result<PaymentIntent>> + Send + 'a;
}

// ─── Object storage ──────────────────────────────────────────────────────────

pub trait ObjectStorage: Send + Sync {
  /// Store `content` under `key` and return a URL the buyer can fetch.
  fn put<'a>(
    &'a self,
    key: &'a str,
    content: Vec<u8>,
    content_type: &'a str,
  ) -> impl Future<Output = Result<String>> + Send + 'a;

  fn exists<'a>(&'a self, key: &'a str) -> impl Future<Output = Result<bool>> + Send + 'a;

  /// The download URL for an object that is known to exist.
  fn url(&self, key: &str) -> String;
}

// ─── Email ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
  pub to:      String,
  pub subject: String,
  pub html:    String,
  pub text:    String,
}

pub trait Mailer: Send + Sync {
  fn send<'a>(&'a self, email: &'a Email) -> impl Future<Output = Result<()>> + Send + 'a;
}
