//! Payment webhook verification and event parsing.
//!
//! The gateway signs each delivery with
//! `Stripe-Signature: t=<unix seconds>,v1=<hex hmac-sha256>` computed over
//! `"{t}.{raw body}"` with the shared webhook secret.

use std::time::Duration;

use caucus_core::{Error, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// How far a signed timestamp may drift from our clock.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

// ─── Verification ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct WebhookVerifier {
  secret:    Vec<u8>,
  tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WebhookVerifier")
      .field("secret", &"<redacted>")
      .field("tolerance", &self.tolerance)
      .finish()
  }
}

impl WebhookVerifier {
  pub fn new(secret: impl Into<Vec<u8>>) -> Self {
    Self { secret: secret.into(), tolerance: DEFAULT_TOLERANCE }
  }

  pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
    self.tolerance = tolerance;
    self
  }

  pub fn verify(&self, payload: &[u8], header: &str) -> Result<()> {
    self.verify_at(payload, header, Utc::now().timestamp())
  }

  /// Verify against an explicit clock reading, in unix seconds.
  pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
    if self.secret.is_empty() {
      return Err(Error::SignatureInvalid("no webhook secret configured".into()));
    }

    let (timestamp, signatures) = parse_header(header)?;
    let drift = now.abs_diff(timestamp);
    if drift > self.tolerance.as_secs() {
      return Err(Error::SignatureInvalid(format!(
        "timestamp is {drift}s away from now"
      )));
    }

    let mac = self.mac(payload, timestamp)?;
    // Any listed v1 signature may match; the gateway lists several while
    // secrets are being rolled.
    if signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok()) {
      Ok(())
    } else {
      Err(Error::SignatureInvalid("no signature matches the payload".into()))
    }
  }

  /// The header value the gateway would send for `payload` at `timestamp`.
  pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
    let tag = self.mac(payload, timestamp)?.finalize().into_bytes();
    Ok(format!("t={timestamp},v1={}", hex::encode(tag)))
  }

  fn mac(&self, payload: &[u8], timestamp: i64) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(&self.secret)
      .map_err(|e| Error::SignatureInvalid(format!("invalid webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
  }
}

fn parse_header(header: &str) -> Result<(i64, Vec<Vec<u8>>)> {
  let mut timestamp = None;
  let mut signatures = Vec::new();

  for part in header.split(',') {
    let Some((key, value)) = part.trim().split_once('=') else { continue };
    match key {
      "t" => {
        let t = value
          .parse::<i64>()
          .map_err(|_| Error::SignatureInvalid("malformed timestamp".into()))?;
        timestamp = Some(t);
      }
      // Unparseable entries are skipped, like unknown schemes.
      "v1" => {
        if let Ok(sig) = hex::decode(value) {
          signatures.push(sig);
        }
      }
      _ => {}
    }
  }

  let timestamp =
    timestamp.ok_or_else(|| Error::SignatureInvalid("missing timestamp".into()))?;
  if signatures.is_empty() {
    return Err(Error::SignatureInvalid("missing v1 signature".into()));
  }
  Ok((timestamp, signatures))
}

// ─── Events ──────────────────────────────────────────────────────────────────

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Deserialize)]
struct RawEvent {
  #[serde(rename = "type")]
  kind: String,
  /// Only read for the event types the pipeline acts on.
  #[serde(default)]
  data: Option<RawData>,
}

#[derive(Debug, Deserialize)]
struct RawData {
  object: RawIntent,
}

#[derive(Debug, Deserialize)]
struct RawIntent {
  #[serde(default)]
  id:       String,
  #[serde(default)]
  metadata: RawMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
  #[serde(rename = "orderId")]
  order_id: Option<String>,
}

/// A verified webhook, reduced to what the pipeline acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
  Succeeded { order_id: i64, reference: String },
  Failed { order_id: i64, reference: String },
  /// Any other event type; acknowledged without action.
  Ignored(String),
}

pub fn parse_event(payload: &[u8]) -> Result<PaymentEvent> {
  let raw: RawEvent = serde_json::from_slice(payload)
    .map_err(|e| Error::Validation(format!("malformed webhook payload: {e}")))?;

  let succeeded = match raw.kind.as_str() {
    PAYMENT_SUCCEEDED => true,
    PAYMENT_FAILED => false,
    _ => return Ok(PaymentEvent::Ignored(raw.kind)),
  };

  let intent = raw
    .data
    .map(|d| d.object)
    .ok_or_else(|| Error::Validation(format!("{} event carries no payment intent", raw.kind)))?;
  let order_id = intent
    .metadata
    .order_id
    .as_deref()
    .and_then(|s| s.trim().parse::<i64>().ok())
    .ok_or_else(|| {
      Error::Validation(format!("payment intent {} carries no order id", intent.id))
    })?;

  Ok(if succeeded {
    PaymentEvent::Succeeded { order_id, reference: intent.id }
  } else {
    PaymentEvent::Failed { order_id, reference: intent.id }
  })
}
