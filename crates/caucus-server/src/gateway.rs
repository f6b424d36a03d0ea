//! Stripe-compatible payment gateway client.

use anyhow::Context as _;
use caucus_core::{
  Error, Result,
  ports::{IntentRequest, PaymentGateway, PaymentIntent},
};
use reqwest::Client;
use serde::Deserialize;

use crate::settings::StripeConfig;

const SERVICE: &str = "payment gateway";

pub struct StripeGateway {
  client:     Client,
  api_base:   String,
  secret_key: String,
}

impl StripeGateway {
  pub fn new(client: Client, config: &StripeConfig) -> anyhow::Result<Self> {
    anyhow::ensure!(!config.secret_key.trim().is_empty(), "stripe.secret_key is empty");
    Ok(Self {
      client,
      api_base: config.api_base.trim_end_matches('/').to_owned(),
      secret_key: config.secret_key.clone(),
    })
  }
}

/// Form fields for `POST /v1/payment_intents`.
pub fn intent_form(request: &IntentRequest) -> Vec<(&'static str, String)> {
  vec![
    ("amount", request.amount.to_string()),
    ("currency", request.currency.clone()),
    ("automatic_payment_methods[enabled]", "true".into()),
    ("metadata[orderId]", request.metadata.order_id.clone()),
    ("metadata[buyerId]", request.metadata.buyer_id.clone()),
    ("metadata[contactCount]", request.metadata.contact_count.clone()),
  ]
}

#[derive(Deserialize)]
struct RawIntent {
  id:            String,
  client_secret: Option<String>,
}

impl PaymentGateway for StripeGateway {
  async fn create_intent<'a>(&'a self, request: &'a IntentRequest) -> Result<PaymentIntent> {
    let resp = self
      .client
      .post(format!("{}/v1/payment_intents", self.api_base))
      .basic_auth(&self.secret_key, None::<&str>)
      .form(&intent_form(request))
      .send()
      .await
      .map_err(|e| Error::upstream(SERVICE, e))?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::upstream(SERVICE, format!("POST /v1/payment_intents → {status}: {body}")));
    }

    let intent: RawIntent = resp.json().await.map_err(|e| Error::upstream(SERVICE, e))?;
    let client_secret = intent
      .client_secret
      .ok_or_else(|| Error::upstream(SERVICE, format!("intent {} has no client secret", intent.id)))?;
    Ok(PaymentIntent { id: intent.id, client_secret })
  }
}

/// Build the shared HTTP client for every outbound integration.
pub fn http_client(timeout: std::time::Duration) -> anyhow::Result<Client> {
  Client::builder()
    .timeout(timeout)
    .build()
    .context("failed to build HTTP client")
}
