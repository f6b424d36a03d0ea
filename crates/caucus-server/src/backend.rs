//! The production [`Backend`]: each collaborator is either the real HTTP
//! integration or its development stand-in, chosen from configuration.

use std::sync::Arc;

use caucus_core::{
  Error, Result,
  ports::{Email, IntentRequest, Mailer, ObjectStorage, PaymentGateway, PaymentIntent},
};
use caucus_orders::{
  Backend, Marketplace,
  local::{LocalStorage, LogMailer},
};
use caucus_store_sqlite::SqliteStore;
use reqwest::Client;

use crate::{
  blob::BlobStorage, gateway::StripeGateway, mailer::ResendMailer, settings::ServerConfig,
};

pub struct Production;

impl Backend for Production {
  type Store = SqliteStore;
  type Gateway = Gateway;
  type Storage = Storage;
  type Mailer = Outbox;
}

// ─── Gateway ─────────────────────────────────────────────────────────────────

pub enum Gateway {
  Stripe(StripeGateway),
  /// Checkouts fail; bypass orders still work when enabled.
  Unconfigured,
}

impl PaymentGateway for Gateway {
  async fn create_intent<'a>(&'a self, request: &'a IntentRequest) -> Result<PaymentIntent> {
    match self {
      Self::Stripe(g) => g.create_intent(request).await,
      Self::Unconfigured => Err(Error::upstream("payment gateway", "no gateway configured")),
    }
  }
}

// ─── Storage ─────────────────────────────────────────────────────────────────

pub enum Storage {
  Blob(BlobStorage),
  Local(LocalStorage),
}

impl ObjectStorage for Storage {
  async fn put<'a>(&'a self, key: &'a str, content: Vec<u8>, content_type: &'a str) -> Result<String> {
    match self {
      Self::Blob(s) => s.put(key, content, content_type).await,
      Self::Local(s) => s.put(key, content, content_type).await,
    }
  }

  async fn exists<'a>(&'a self, key: &'a str) -> Result<bool> {
    match self {
      Self::Blob(s) => s.exists(key).await,
      Self::Local(s) => s.exists(key).await,
    }
  }

  fn url(&self, key: &str) -> String {
    match self {
      Self::Blob(s) => s.url(key),
      Self::Local(s) => s.url(key),
    }
  }
}

// ─── Mailer ──────────────────────────────────────────────────────────────────

pub enum Outbox {
  Resend(ResendMailer),
  Log(LogMailer),
}

impl Mailer for Outbox {
  async fn send<'a>(&'a self, email: &'a Email) -> Result<()> {
    match self {
      Self::Resend(m) => m.send(email).await,
      Self::Log(m) => m.send(email).await,
    }
  }
}

// ─── Assembly ────────────────────────────────────────────────────────────────

pub fn marketplace(
  config: &ServerConfig,
  store: Arc<SqliteStore>,
  client: Client,
) -> anyhow::Result<Marketplace<Production>> {
  let gateway = match &config.stripe {
    Some(stripe) => Gateway::Stripe(StripeGateway::new(client.clone(), stripe)?),
    None => {
      tracing::warn!("no [stripe] section; checkouts will fail");
      Gateway::Unconfigured
    }
  };

  let storage = match &config.azure {
    Some(azure) => Storage::Blob(BlobStorage::new(client.clone(), azure)?),
    None => {
      tracing::info!(dir = ?config.export_dir, "no [azure] section; storing exports locally");
      Storage::Local(LocalStorage::new(config.export_dir.clone()))
    }
  };

  let mailer = match &config.resend {
    Some(resend) => Outbox::Resend(ResendMailer::new(client, resend)?),
    None => {
      tracing::info!("no [resend] section; confirmation emails go to the log");
      Outbox::Log(LogMailer)
    }
  };

  if config.webhook_secret.is_empty() {
    tracing::warn!("webhook_secret is empty; every payment webhook will be rejected");
  }
  if config.allow_payment_bypass {
    tracing::warn!(target: caucus_orders::machine::AUDIT_TARGET, "payment bypass is ENABLED");
  }

  Ok(Marketplace::new(
    store,
    Arc::new(gateway),
    Arc::new(storage),
    Arc::new(mailer),
    config.market_config(),
  ))
}
