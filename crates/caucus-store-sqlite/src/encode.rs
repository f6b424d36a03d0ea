//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings; the contact list of an order is a
//! compact JSON array of contact refs.

use caucus_core::{
  contact::{Contact, ContactDetails},
  order::{ContactRef, Order},
  segment::Segment,
};
use chrono::{DateTime, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Contact refs ────────────────────────────────────────────────────────────

pub fn encode_refs(refs: &[ContactRef]) -> Result<String> {
  Ok(serde_json::to_string(refs)?)
}

pub fn decode_refs(s: &str) -> Result<Vec<ContactRef>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns of the `orders` table, in `SELECT` order.
pub const ORDER_COLUMNS: &str = "id, buyer_id, contact_ids, amount, currency, status, \
                                 payment_reference, notify_email, created_at, updated_at";

/// Raw values read directly from an `orders` row.
pub struct RawOrder {
  pub id:                i64,
  pub buyer_id:          String,
  pub contact_ids:       String,
  pub amount:            i64,
  pub currency:          String,
  pub status:            String,
  pub payment_reference: Option<String>,
  pub notify_email:      Option<String>,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawOrder {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      buyer_id:          row.get(1)?,
      contact_ids:       row.get(2)?,
      amount:            row.get(3)?,
      currency:          row.get(4)?,
      status:            row.get(5)?,
      payment_reference: row.get(6)?,
      notify_email:      row.get(7)?,
      created_at:        row.get(8)?,
      updated_at:        row.get(9)?,
    })
  }

  pub fn into_order(self) -> Result<Order> {
    Ok(Order {
      id:                self.id,
      buyer_id:          self.buyer_id,
      contacts:          decode_refs(&self.contact_ids)?,
      amount:            self.amount,
      currency:          self.currency,
      status:            self.status.parse()?,
      payment_reference: self.payment_reference,
      notify_email:      self.notify_email,
      created_at:        decode_dt(&self.created_at)?,
      updated_at:        decode_dt(&self.updated_at)?,
    })
  }
}

/// Decode a row selected with [`crate::adapter::Adapter::select_list`].
pub fn contact_from_row(segment: Segment, row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
  Ok(Contact {
    id:      row.get("id")?,
    details: ContactDetails::from_columns(segment, |col| row.get::<_, Option<String>>(col))?,
  })
}
