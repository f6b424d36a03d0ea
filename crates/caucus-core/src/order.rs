//! Orders: one purchase attempt and its payment lifecycle.

use std::{fmt, future::Future, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, contact::ContactKey, segment::Segment};

// ─── Status ──────────────────────────────────────────────────────────────────

/// `pending -> {completed, failed}`; both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Completed,
  Failed,
}

impl OrderStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }

  pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "pending" => Ok(Self::Pending),
      "completed" => Ok(Self::Completed),
      "failed" => Ok(Self::Failed),
      other => Err(Error::DataIntegrity(format!("unknown order status: {other:?}"))),
    }
  }
}

// ─── Contact references ──────────────────────────────────────────────────────

/// One purchased line item.
///
/// Listings carry the segment, so new orders reference contacts by
/// [`ContactKey`]. A bare id is still accepted for older clients; it cannot
/// say which segment it came from and is resolved by fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawContactRef", into = "RawContactRef")]
pub struct ContactRef {
  pub segment: Option<Segment>,
  pub id:      i64,
}

impl ContactRef {
  pub fn scoped(segment: Segment, id: i64) -> Self { Self { segment: Some(segment), id } }

  pub fn bare(id: i64) -> Self { Self { segment: None, id } }
}

impl From<ContactKey> for ContactRef {
  fn from(key: ContactKey) -> Self { Self::scoped(key.segment, key.id) }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawContactRef {
  Bare(i64),
  Scoped { segment: Segment, id: i64 },
}

impl From<RawContactRef> for ContactRef {
  fn from(raw: RawContactRef) -> Self {
    match raw {
      RawContactRef::Bare(id) => Self::bare(id),
      RawContactRef::Scoped { segment, id } => Self::scoped(segment, id),
    }
  }
}

impl From<ContactRef> for RawContactRef {
  fn from(r: ContactRef) -> Self {
    match r.segment {
      Some(segment) => Self::Scoped { segment, id: r.id },
      None => Self::Bare(r.id),
    }
  }
}

// ─── Order ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
  pub id:                i64,
  pub buyer_id:          String,
  pub contacts:          Vec<ContactRef>,
  /// Minor currency units (cents).
  pub amount:            i64,
  pub currency:          String,
  pub status:            OrderStatus,
  /// The gateway's payment-intent id, once one exists.
  pub payment_reference: Option<String>,
  /// Where the purchase confirmation goes.
  pub notify_email:      Option<String>,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// Input to [`OrderStore::insert_order`]. Status and timestamps are set by
/// the store.
#[derive(Debug, Clone)]
pub struct NewOrder {
  pub buyer_id:     String,
  pub contacts:     Vec<ContactRef>,
  pub amount:       i64,
  pub currency:     String,
  pub notify_email: Option<String>,
}

impl NewOrder {
  pub fn validate(&self) -> Result<()> {
    if self.buyer_id.trim().is_empty() {
      return Err(Error::Validation("buyer id is required".into()));
    }
    if self.contacts.is_empty() {
      return Err(Error::Validation("at least one contact is required".into()));
    }
    if self.amount < 0 {
      return Err(Error::Validation("amount must not be negative".into()));
    }
    if self.currency.trim().is_empty() {
      return Err(Error::Validation("currency is required".into()));
    }
    Ok(())
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Persistence for orders. Status changes go through
/// [`OrderStore::transition_from_pending`], a single atomic compare-and-set.
pub trait OrderStore: Send + Sync {
  /// Persist a new `pending` order. Either the whole row exists afterwards
  /// or nothing does.
  fn insert_order(
    &self,
    input: NewOrder,
  ) -> impl Future<Output = Result<Order>> + Send + '_;

  fn get_order(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Order>>> + Send + '_;

  /// All orders for a buyer, newest first.
  fn list_orders<'a>(
    &'a self,
    buyer_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Order>>> + Send + 'a;

  /// Set the payment reference on a `pending` order. Returns `None` when no
  /// pending order with that id exists.
  fn attach_payment_reference(
    &self,
    id: i64,
    reference: String,
  ) -> impl Future<Output = Result<Option<Order>>> + Send + '_;

  /// Move a `pending` order to `to`, recording `reference` when given.
  /// Returns `None` without writing anything if the order is missing or no
  /// longer pending.
  fn transition_from_pending(
    &self,
    id: i64,
    to: OrderStatus,
    reference: Option<String>,
  ) -> impl Future<Output = Result<Option<Order>>> + Send + '_;
}
