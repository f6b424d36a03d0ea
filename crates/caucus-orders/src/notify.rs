//! Purchase confirmation email.

use std::sync::Arc;

use caucus_core::{
  order::Order,
  ports::{Email, Mailer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
  Sent,
  /// The order has no recipient.
  Skipped,
  /// The mailer failed; the order is unaffected.
  Failed,
}

pub struct Dispatcher<M> {
  mailer: Arc<M>,
}

impl<M: Mailer> Dispatcher<M> {
  pub fn new(mailer: Arc<M>) -> Self { Self { mailer } }

  /// Tell the buyer where to download `order`. Never fails the caller.
  pub async fn notify(&self, order: &Order, download_url: &str) -> NotifyOutcome {
    let Some(to) = order.notify_email.as_deref() else {
      tracing::info!(order_id = order.id, "order has no notification address; skipping email");
      return NotifyOutcome::Skipped;
    };

    let email = confirmation_email(order, to, download_url);
    match self.mailer.send(&email).await {
      Ok(()) => {
        tracing::info!(order_id = order.id, "confirmation email sent");
        NotifyOutcome::Sent
      }
      Err(e) => {
        tracing::warn!(order_id = order.id, error = %e, "confirmation email failed");
        NotifyOutcome::Failed
      }
    }
  }
}

/// `4900, "cad"` → `$49.00 CAD`.
pub fn format_amount(amount: i64, currency: &str) -> String {
  let sign = if amount < 0 { "-" } else { "" };
  let abs = amount.unsigned_abs();
  format!("{sign}${}.{:02} {}", abs / 100, abs % 100, currency.to_uppercase())
}

pub fn confirmation_email(order: &Order, to: &str, download_url: &str) -> Email {
  let count = order.contacts.len();
  let amount = format_amount(order.amount, &order.currency);
  let id = order.id;

  let html = format!(
    "<h1>Your contact list is ready</h1>\
     <p>Thank you for your purchase. Your parliamentary contact list is ready to download.</p>\
     <table>\
     <tr><td>Order</td><td>#{id}</td></tr>\
     <tr><td>Contacts</td><td>{count}</td></tr>\
     <tr><td>Amount paid</td><td>{amount}</td></tr>\
     </table>\
     <p><a href=\"{download_url}\">Download your CSV</a></p>\
     <p>Queen Street Analytics</p>"
  );
  let text = format!(
    "Your contact list is ready\n\n\
     Order: #{id}\n\
     Contacts: {count}\n\
     Amount paid: {amount}\n\n\
     Download your CSV: {download_url}\n\n\
     Queen Street Analytics\n"
  );

  Email {
    to: to.to_owned(),
    subject: format!("Your Parliamentary Contact List is Ready - Order #{id}"),
    html,
    text,
  }
}

#[cfg(test)]
mod tests {
  use caucus_core::order::{ContactRef, OrderStatus};
  use chrono::Utc;

  use super::*;

  #[test]
  fn amounts_format_as_dollars() {
    assert_eq!(format_amount(4900, "cad"), "$49.00 CAD");
    assert_eq!(format_amount(5, "usd"), "$0.05 USD");
    assert_eq!(format_amount(123_456, "cad"), "$1234.56 CAD");
  }

  #[test]
  fn email_names_order_count_amount_and_link() {
    let order = Order {
      id:                12,
      buyer_id:          "b1".into(),
      contacts:          vec![ContactRef::bare(1), ContactRef::bare(2), ContactRef::bare(3)],
      amount:            4900,
      currency:          "cad".into(),
      status:            OrderStatus::Completed,
      payment_reference: Some("pi_1".into()),
      notify_email:      Some("buyer@example.com".into()),
      created_at:        Utc::now(),
      updated_at:        Utc::now(),
    };
    let email = confirmation_email(&order, "buyer@example.com", "https://dl.example/12.csv");
    assert_eq!(email.subject, "Your Parliamentary Contact List is Ready - Order #12");
    for body in [&email.html, &email.text] {
      assert!(body.contains("#12"));
      assert!(body.contains("$49.00 CAD"));
      assert!(body.contains("https://dl.example/12.csv"));
    }
    assert!(email.text.contains("Contacts: 3"));
  }
}
