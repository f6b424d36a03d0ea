//! Handlers for checkout, order history, and downloads.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/checkout` | Body: `{"buyer_id","contacts":[…],"amount"?,"email"?,"bypass"?}` |
//! | `GET`  | `/orders` | `?buyer_id=`; newest first |
//! | `GET`  | `/orders/{id}/download` | 303 to stored export, or the CSV inline |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use caucus_core::{artifact::Delivery, order::Order};
use caucus_orders::{Backend, Marketplace, export, machine::CheckoutRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ─── Checkout ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
  #[serde(flatten)]
  pub request: CheckoutRequest,
  /// Complete the order without a payment, if the server allows it.
  #[serde(default)]
  pub bypass:  bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CheckoutResponse {
  Intent { order_id: i64, client_secret: String },
  Bypassed { order_id: i64, bypass: bool },
}

/// `POST /checkout`
pub async fn checkout<B: Backend>(
  State(market): State<Arc<Marketplace<B>>>,
  Json(body): Json<CheckoutBody>,
) -> Result<impl IntoResponse, ApiError> {
  let response = if body.bypass {
    let order = market.machine().complete_without_payment(body.request).await?;
    CheckoutResponse::Bypassed { order_id: order.id, bypass: true }
  } else {
    let checkout = market.machine().checkout(body.request).await?;
    CheckoutResponse::Intent {
      order_id:      checkout.order.id,
      client_secret: checkout.client_secret,
    }
  };
  Ok((StatusCode::CREATED, Json(response)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default, alias = "userId")]
  pub buyer_id: String,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
  pub orders: Vec<Order>,
}

/// `GET /orders?buyer_id=<id>`
pub async fn list<B: Backend>(
  State(market): State<Arc<Marketplace<B>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<OrdersResponse>, ApiError> {
  let orders = market.machine().orders_for_buyer(&params.buyer_id).await?;
  Ok(Json(OrdersResponse { orders }))
}

// ─── Download ─────────────────────────────────────────────────────────────────

/// `GET /orders/{id}/download`
pub async fn download<B: Backend>(
  State(market): State<Arc<Marketplace<B>>>,
  Path(id): Path<String>,
) -> Result<Response, ApiError> {
  let order_id: i64 = id
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("invalid order id: {id:?}")))?;

  let artifact = market.download(order_id).await?;
  let response = match artifact.delivery {
    Delivery::Durable { url, .. } => {
      (StatusCode::SEE_OTHER, [(header::LOCATION, url)]).into_response()
    }
    Delivery::Direct { content } => (
      [
        (header::CONTENT_TYPE, export::CONTENT_TYPE.to_owned()),
        (
          header::CONTENT_DISPOSITION,
          format!("attachment; filename=\"{}\"", artifact.filename),
        ),
      ],
      content,
    )
      .into_response(),
  };
  Ok(response)
}
