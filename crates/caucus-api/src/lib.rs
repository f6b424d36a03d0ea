//! JSON HTTP API for the Caucus marketplace.
//!
//! Exposes an axum [`Router`] over a [`Marketplace`]. The server binary
//! nests it under `/api`.

pub mod contacts;
pub mod error;
pub mod orders;
pub mod webhook;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use caucus_orders::{Backend, Marketplace};
use serde_json::{Value, json};

/// Build the API router.
pub fn api_router<B: Backend>(market: Arc<Marketplace<B>>) -> Router<()> {
  Router::new()
    .route("/health",                get(health))
    .route("/contacts",              get(contacts::search::<B>))
    .route("/filters",               get(contacts::filters::<B>))
    .route("/checkout",              post(orders::checkout::<B>))
    .route("/orders",                get(orders::list::<B>))
    .route("/orders/{id}/download",  get(orders::download::<B>))
    .route("/webhooks/payment",      post(webhook::receive::<B>))
    .with_state(market)
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

#[cfg(test)]
mod tests;
