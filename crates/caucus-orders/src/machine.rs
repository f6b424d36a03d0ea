//! The order state machine.
//!
//! `pending -> {completed, failed}`. Every status change is a single
//! compare-and-set in the store, so concurrent webhook deliveries for the
//! same order cannot both apply.

use std::{sync::Arc, time::Duration};

use caucus_core::{
  Error, Result,
  order::{ContactRef, NewOrder, Order, OrderStatus, OrderStore},
  ports::{IntentMetadata, IntentRequest, PaymentGateway},
};
use serde::Deserialize;

pub const AUDIT_TARGET: &str = "caucus::audit";

#[derive(Debug, Clone)]
pub struct MachineConfig {
  pub currency:             String,
  /// Minor units charged when a checkout names no amount.
  pub default_amount:       i64,
  pub gateway_timeout:      Duration,
  pub allow_payment_bypass: bool,
}

impl Default for MachineConfig {
  fn default() -> Self {
    Self {
      currency:             "cad".into(),
      default_amount:       4900,
      gateway_timeout:      Duration::from_secs(15),
      allow_payment_bypass: false,
    }
  }
}

/// Buyer-side input to a checkout. Missing fields deserialise empty and are
/// rejected by validation, so callers get one kind of error.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
  #[serde(default, alias = "userId")]
  pub buyer_id: String,
  #[serde(default, alias = "contactIds")]
  pub contacts: Vec<ContactRef>,
  #[serde(default)]
  pub amount:   Option<i64>,
  #[serde(default)]
  pub email:    Option<String>,
}

#[derive(Debug, Clone)]
pub struct Checkout {
  pub order:         Order,
  pub client_secret: String,
}

/// Result of a webhook-driven status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
  /// This call moved the order out of `pending`.
  Applied(Order),
  /// The order already had the requested status; nothing was written.
  AlreadyInState(Order),
}

impl Transition {
  pub fn order(&self) -> &Order {
    match self {
      Self::Applied(o) | Self::AlreadyInState(o) => o,
    }
  }

  pub fn is_applied(&self) -> bool { matches!(self, Self::Applied(_)) }
}

pub struct OrderMachine<S, G> {
  store:   Arc<S>,
  gateway: Arc<G>,
  config:  MachineConfig,
}

impl<S, G> OrderMachine<S, G>
where
  S: OrderStore,
  G: PaymentGateway,
{
  pub fn new(store: Arc<S>, gateway: Arc<G>, config: MachineConfig) -> Self {
    Self { store, gateway, config }
  }

  pub fn config(&self) -> &MachineConfig { &self.config }

  fn new_order(&self, request: CheckoutRequest) -> NewOrder {
    NewOrder {
      buyer_id:     request.buyer_id,
      contacts:     request.contacts,
      amount:       request.amount.unwrap_or(self.config.default_amount),
      currency:     self.config.currency.clone(),
      notify_email: request.email.filter(|e| !e.trim().is_empty()),
    }
  }

  /// Persist a new `pending` order.
  pub async fn create(&self, input: NewOrder) -> Result<Order> {
    input.validate()?;
    let order = self.store.insert_order(input).await?;
    tracing::info!(
      order_id = order.id,
      buyer_id = %order.buyer_id,
      contacts = order.contacts.len(),
      amount = order.amount,
      "order created"
    );
    Ok(order)
  }

  /// Create an order and a payment intent for it.
  ///
  /// If the gateway fails or times out the new order is marked `failed`, so
  /// no pending order is left without an intent.
  pub async fn checkout(&self, request: CheckoutRequest) -> Result<Checkout> {
    let order = self.create(self.new_order(request)).await?;

    let intent_request = IntentRequest {
      amount:   order.amount,
      currency: order.currency.clone(),
      metadata: IntentMetadata {
        order_id:      order.id.to_string(),
        buyer_id:      order.buyer_id.clone(),
        contact_count: order.contacts.len().to_string(),
      },
    };

    let outcome =
      tokio::time::timeout(self.config.gateway_timeout, self.gateway.create_intent(&intent_request))
        .await;

    let intent = match outcome {
      Ok(Ok(intent)) => intent,
      Ok(Err(e)) => return Err(self.abandon(order.id, e).await),
      Err(_) => {
        let e = Error::upstream(
          "payment gateway",
          format!("no response within {:?}", self.config.gateway_timeout),
        );
        return Err(self.abandon(order.id, e).await);
      }
    };

    let order = self.attach_payment_reference(order.id, intent.id).await?;
    Ok(Checkout { order, client_secret: intent.client_secret })
  }

  async fn abandon(&self, order_id: i64, cause: Error) -> Error {
    tracing::warn!(order_id, error = %cause, "payment intent creation failed; failing order");
    if let Err(e) = self.store.transition_from_pending(order_id, OrderStatus::Failed, None).await {
      tracing::error!(order_id, error = %e, "could not fail abandoned order");
    }
    match cause {
      e @ Error::UpstreamUnavailable { .. } => e,
      other => Error::upstream("payment gateway", other),
    }
  }

  /// Record the gateway's intent id on a `pending` order.
  pub async fn attach_payment_reference(&self, order_id: i64, reference: String) -> Result<Order> {
    self
      .store
      .attach_payment_reference(order_id, reference)
      .await?
      .ok_or(Error::NotFoundOrNotCompleted(order_id))
  }

  pub async fn mark_completed(&self, order_id: i64, reference: Option<String>) -> Result<Transition> {
    self.transition(order_id, OrderStatus::Completed, reference).await
  }

  pub async fn mark_failed(&self, order_id: i64, reference: Option<String>) -> Result<Transition> {
    self.transition(order_id, OrderStatus::Failed, reference).await
  }

  async fn transition(
    &self,
    order_id: i64,
    to: OrderStatus,
    reference: Option<String>,
  ) -> Result<Transition> {
    let current = self
      .store
      .get_order(order_id)
      .await?
      .ok_or(Error::NotFoundOrNotCompleted(order_id))?;

    if let (Some(attached), Some(delivered)) = (&current.payment_reference, &reference) {
      if attached != delivered {
        tracing::error!(
          order_id,
          attached = %attached,
          delivered = %delivered,
          "payment reference does not match the order"
        );
        return Err(Error::AnomalousTransition {
          order_id,
          current: current.status,
          attempted: to,
        });
      }
    }

    let current = if current.status == OrderStatus::Pending {
      match self.store.transition_from_pending(order_id, to, reference).await? {
        Some(order) => {
          tracing::info!(order_id, status = %to, "order transitioned");
          return Ok(Transition::Applied(order));
        }
        // Lost the race; judge against whatever won.
        None => self
          .store
          .get_order(order_id)
          .await?
          .ok_or(Error::NotFoundOrNotCompleted(order_id))?,
      }
    } else {
      current
    };

    if current.status == to {
      tracing::info!(order_id, status = %to, "order already in requested state");
      Ok(Transition::AlreadyInState(current))
    } else {
      tracing::error!(
        order_id,
        current = %current.status,
        attempted = %to,
        "refusing transition out of a terminal state"
      );
      Err(Error::AnomalousTransition { order_id, current: current.status, attempted: to })
    }
  }

  /// Create an order and complete it without a payment.
  ///
  /// Only available when `allow_payment_bypass` is set; every attempt is
  /// written to the audit log.
  pub async fn complete_without_payment(&self, request: CheckoutRequest) -> Result<Order> {
    if !self.config.allow_payment_bypass {
      tracing::warn!(
        target: AUDIT_TARGET,
        buyer_id = %request.buyer_id,
        "payment bypass refused: disabled by configuration"
      );
      return Err(Error::BypassDisabled);
    }

    let order = self.create(self.new_order(request)).await?;
    let order = self
      .store
      .transition_from_pending(order.id, OrderStatus::Completed, None)
      .await?
      .ok_or(Error::NotFoundOrNotCompleted(order.id))?;

    tracing::warn!(
      target: AUDIT_TARGET,
      order_id = order.id,
      buyer_id = %order.buyer_id,
      contacts = order.contacts.len(),
      "order completed without payment"
    );
    Ok(order)
  }

  pub async fn get(&self, order_id: i64) -> Result<Option<Order>> {
    self.store.get_order(order_id).await
  }

  /// A buyer's orders, newest first.
  pub async fn orders_for_buyer(&self, buyer_id: &str) -> Result<Vec<Order>> {
    let buyer_id = buyer_id.trim();
    if buyer_id.is_empty() {
      return Err(Error::Validation("buyer id is required".into()));
    }
    self.store.list_orders(buyer_id).await
  }
}
