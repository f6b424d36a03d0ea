//! The downloadable file produced for a completed order.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How the artifact reaches the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
  /// Stored in object storage; later downloads reuse it.
  Durable { key: String, url: String },
  /// Storage was unavailable; the content is handed over once and will be
  /// regenerated on the next request.
  Direct {
    #[serde(skip)]
    content: String,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FulfillmentArtifact {
  pub order_id:      i64,
  pub contact_count: usize,
  pub filename:      String,
  pub created_at:    DateTime<Utc>,
  pub delivery:      Delivery,
}

impl FulfillmentArtifact {
  pub fn durable_url(&self) -> Option<&str> {
    match &self.delivery {
      Delivery::Durable { url, .. } => Some(url),
      Delivery::Direct { .. } => None,
    }
  }
}

/// Storage key for an order's export. Deterministic so a re-request can find
/// an earlier upload.
pub fn artifact_key(order_id: i64, contact_count: usize) -> String {
  format!(
    "orders/{order_id}/parliamentary-contacts-{order_id}-{contact_count}-contacts.csv"
  )
}

/// File name offered to the browser on download.
pub fn download_filename(order_id: i64) -> String {
  format!("parliamentary-contacts-order-{order_id}.csv")
}
