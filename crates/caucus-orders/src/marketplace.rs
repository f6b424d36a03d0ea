//! [`Marketplace`]: the pipeline wired together.

use std::{sync::Arc, time::Duration};

use caucus_core::{
  Error, Result,
  artifact::FulfillmentArtifact,
  directory::Directory,
  order::{Order, OrderStore},
  ports::{Mailer, ObjectStorage, PaymentGateway},
};

use crate::{
  assembler::Assembler,
  machine::{MachineConfig, OrderMachine, Transition},
  notify::{Dispatcher, NotifyOutcome},
  webhook::{self, PaymentEvent, WebhookVerifier},
};

/// The concrete collaborators behind a [`Marketplace`].
pub trait Backend: Send + Sync + 'static {
  type Store: Directory + OrderStore + 'static;
  type Gateway: PaymentGateway + 'static;
  type Storage: ObjectStorage + 'static;
  type Mailer: Mailer + 'static;
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
  /// Public origin of the API, used for download links in emails.
  pub base_url:          String,
  pub webhook_secret:    String,
  pub webhook_tolerance: Duration,
  pub machine:           MachineConfig,
}

impl Default for MarketConfig {
  fn default() -> Self {
    Self {
      base_url:          "http://localhost:8080/api".into(),
      webhook_secret:    String::new(),
      webhook_tolerance: webhook::DEFAULT_TOLERANCE,
      machine:           MachineConfig::default(),
    }
  }
}

/// What a webhook delivery did. Every variant is acknowledged to the
/// gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
  Completed { order_id: i64, notification: Option<NotifyOutcome> },
  AlreadyCompleted { order_id: i64 },
  Failed { order_id: i64 },
  AlreadyFailed { order_id: i64 },
  /// Logged and left as it was.
  Anomalous { order_id: i64 },
  Ignored { event_type: String },
}

pub struct Marketplace<B: Backend> {
  store:      Arc<B::Store>,
  machine:    OrderMachine<B::Store, B::Gateway>,
  assembler:  Assembler<B::Store, B::Storage>,
  dispatcher: Dispatcher<B::Mailer>,
  verifier:   WebhookVerifier,
  base_url:   String,
}

impl<B: Backend> Marketplace<B> {
  pub fn new(
    store: Arc<B::Store>,
    gateway: Arc<B::Gateway>,
    storage: Arc<B::Storage>,
    mailer: Arc<B::Mailer>,
    config: MarketConfig,
  ) -> Self {
    Self {
      machine:    OrderMachine::new(store.clone(), gateway, config.machine),
      assembler:  Assembler::new(store.clone(), storage),
      dispatcher: Dispatcher::new(mailer),
      verifier:   WebhookVerifier::new(config.webhook_secret)
        .with_tolerance(config.webhook_tolerance),
      base_url:   config.base_url.trim_end_matches('/').to_owned(),
      store,
    }
  }

  pub fn directory(&self) -> &B::Store { &self.store }

  pub fn machine(&self) -> &OrderMachine<B::Store, B::Gateway> { &self.machine }

  /// The stable API route that rebuilds an order's export on demand.
  pub fn download_route(&self, order_id: i64) -> String {
    format!("{}/orders/{order_id}/download", self.base_url)
  }

  pub async fn download(&self, order_id: i64) -> Result<FulfillmentArtifact> {
    self.assembler.assemble(order_id).await
  }

  /// Verify, parse and apply one gateway delivery.
  ///
  /// Errors are reserved for deliveries the gateway should retry or that
  /// must be rejected: bad signatures, unreadable payloads, and store
  /// outages.
  pub async fn handle_webhook(
    &self,
    payload: &[u8],
    signature: Option<&str>,
  ) -> Result<WebhookOutcome> {
    let signature =
      signature.ok_or_else(|| Error::SignatureInvalid("missing signature header".into()))?;
    if let Err(e) = self.verifier.verify(payload, signature) {
      tracing::warn!(error = %e, "rejected webhook with invalid signature");
      return Err(e);
    }

    match webhook::parse_event(payload)? {
      PaymentEvent::Succeeded { order_id, reference } => {
        match self.machine.mark_completed(order_id, Some(reference)).await {
          Ok(Transition::Applied(order)) => {
            let notification = self.fulfil(&order).await;
            Ok(WebhookOutcome::Completed { order_id, notification })
          }
          Ok(Transition::AlreadyInState(_)) => Ok(WebhookOutcome::AlreadyCompleted { order_id }),
          Err(e) => acknowledge(order_id, e),
        }
      }
      PaymentEvent::Failed { order_id, reference } => {
        match self.machine.mark_failed(order_id, Some(reference)).await {
          Ok(Transition::Applied(_)) => Ok(WebhookOutcome::Failed { order_id }),
          Ok(Transition::AlreadyInState(_)) => Ok(WebhookOutcome::AlreadyFailed { order_id }),
          Err(e) => acknowledge(order_id, e),
        }
      }
      PaymentEvent::Ignored(event_type) => {
        tracing::debug!(%event_type, "ignoring webhook event");
        Ok(WebhookOutcome::Ignored { event_type })
      }
    }
  }

  /// Assemble a freshly completed order and email the buyer. Returns `None`
  /// when assembly failed and no email was attempted.
  async fn fulfil(&self, order: &Order) -> Option<NotifyOutcome> {
    let artifact = match self.assembler.assemble(order.id).await {
      Ok(artifact) => artifact,
      Err(e) => {
        tracing::error!(order_id = order.id, error = %e, "fulfillment failed after payment");
        return None;
      }
    };

    let url = artifact
      .durable_url()
      .map(str::to_owned)
      .unwrap_or_else(|| self.download_route(order.id));
    Some(self.dispatcher.notify(order, &url).await)
  }
}

/// Anomalies and unknown orders are acknowledged so the gateway stops
/// redelivering; anything else is retried.
fn acknowledge(order_id: i64, error: Error) -> Result<WebhookOutcome> {
  match error {
    Error::AnomalousTransition { .. } => Ok(WebhookOutcome::Anomalous { order_id }),
    Error::NotFoundOrNotCompleted(_) => {
      tracing::error!(order_id, "webhook names an order that does not exist");
      Ok(WebhookOutcome::Anomalous { order_id })
    }
    other => Err(other),
  }
}
