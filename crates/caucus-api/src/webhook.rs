//! `POST /webhooks/payment`: signed gateway deliveries.
//!
//! The body is taken raw: the signature covers the exact bytes sent.

use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::State,
  http::HeaderMap,
};
use caucus_orders::{Backend, Marketplace, WebhookOutcome, webhook::SIGNATURE_HEADER};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct Receipt {
  pub received: bool,
  pub outcome:  &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order_id: Option<i64>,
}

impl From<&WebhookOutcome> for Receipt {
  fn from(outcome: &WebhookOutcome) -> Self {
    let (label, order_id) = match outcome {
      WebhookOutcome::Completed { order_id, .. } => ("completed", Some(*order_id)),
      WebhookOutcome::AlreadyCompleted { order_id } => ("already_completed", Some(*order_id)),
      WebhookOutcome::Failed { order_id } => ("failed", Some(*order_id)),
      WebhookOutcome::AlreadyFailed { order_id } => ("already_failed", Some(*order_id)),
      WebhookOutcome::Anomalous { order_id } => ("anomalous", Some(*order_id)),
      WebhookOutcome::Ignored { .. } => ("ignored", None),
    };
    Self { received: true, outcome: label, order_id }
  }
}

/// `POST /webhooks/payment`
pub async fn receive<B: Backend>(
  State(market): State<Arc<Marketplace<B>>>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<Json<Receipt>, ApiError> {
  let signature = headers
    .get(SIGNATURE_HEADER)
    .map(|v| v.to_str().map_err(|_| ApiError::BadRequest("signature header is not ASCII".into())))
    .transpose()?;

  let outcome = market.handle_webhook(&body, signature).await?;
  Ok(Json(Receipt::from(&outcome)))
}
