//! Fulfillment assembly: completed order → contacts → CSV → storage.

use std::sync::Arc;

use caucus_core::{
  Error, Result,
  artifact::{Delivery, FulfillmentArtifact, artifact_key, download_filename},
  directory::Directory,
  order::{OrderStatus, OrderStore},
  ports::ObjectStorage,
};
use chrono::Utc;

use crate::export;

pub struct Assembler<S, O> {
  store:   Arc<S>,
  storage: Arc<O>,
}

impl<S, O> Assembler<S, O>
where
  S: Directory + OrderStore,
  O: ObjectStorage,
{
  pub fn new(store: Arc<S>, storage: Arc<O>) -> Self { Self { store, storage } }

  /// Build (or find) the export for a completed order.
  ///
  /// Storage trouble never fails the call: the CSV is then handed back as
  /// [`Delivery::Direct`] and rebuilt on the next request.
  pub async fn assemble(&self, order_id: i64) -> Result<FulfillmentArtifact> {
    let order = self
      .store
      .get_order(order_id)
      .await?
      .filter(|o| o.status == OrderStatus::Completed)
      .ok_or(Error::NotFoundOrNotCompleted(order_id))?;

    let contacts = self.store.fetch_by_refs(&order.contacts).await;
    if contacts.is_empty() {
      tracing::error!(
        order_id,
        purchased = order.contacts.len(),
        "completed order resolved to zero contacts"
      );
      return Err(Error::EmptyResultSet(order_id));
    }
    if contacts.len() < order.contacts.len() {
      tracing::warn!(
        order_id,
        purchased = order.contacts.len(),
        resolved = contacts.len(),
        "some purchased contacts could not be resolved"
      );
    }

    let key = artifact_key(order_id, contacts.len());
    let artifact = |delivery| FulfillmentArtifact {
      order_id,
      contact_count: contacts.len(),
      filename: download_filename(order_id),
      created_at: Utc::now(),
      delivery,
    };

    let storage_up = match self.storage.exists(&key).await {
      Ok(true) => {
        tracing::debug!(order_id, %key, "reusing stored export");
        return Ok(artifact(Delivery::Durable { url: self.storage.url(&key), key }));
      }
      Ok(false) => true,
      Err(e) => {
        tracing::warn!(order_id, %key, error = %e, "object storage unavailable; delivering export directly");
        false
      }
    };

    let content = export::render(&contacts)?;
    if !storage_up {
      return Ok(artifact(Delivery::Direct { content }));
    }

    match self.storage.put(&key, content.clone().into_bytes(), export::CONTENT_TYPE).await {
      Ok(url) => {
        tracing::info!(order_id, %key, contacts = contacts.len(), "export stored");
        Ok(artifact(Delivery::Durable { key, url }))
      }
      Err(e) => {
        tracing::warn!(order_id, %key, error = %e, "export upload failed; delivering export directly");
        Ok(artifact(Delivery::Direct { content }))
      }
    }
  }
}
