//! Pipeline tests: a real in-memory store with fake gateway, storage and
//! mailer.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use caucus_core::{
  Error,
  artifact::{Delivery, artifact_key},
  directory::Directory,
  order::{ContactRef, OrderStatus, OrderStore},
  ports::{
    Email, IntentRequest, Mailer, ObjectStorage, PaymentGateway, PaymentIntent,
  },
};
use caucus_store_sqlite::SqliteStore;
use chrono::Utc;

use crate::{
  Backend, MarketConfig, Marketplace, WebhookOutcome,
  machine::CheckoutRequest,
  notify::NotifyOutcome,
  webhook::WebhookVerifier,
};

const SECRET: &str = "whsec_test";

const FIXTURE: &str = "
INSERT INTO mv_contacts_mp_and_constituency_assistants
  (id, person_type, full_name, political_party, province, email)
VALUES
  (1,  'MP', 'Alice Tremblay', 'Liberal', 'Ontario', 'alice@parl.gc.ca'),
  (2,  'MP', 'Bob Singh', 'Conservative', 'Alberta', 'bob@parl.gc.ca'),
  (3,  'MP', 'Carol Ng', 'NDP', 'Quebec', 'carol@parl.gc.ca'),
  (7,  'MP', 'Dev Patel', 'Liberal', 'Ontario', NULL),
  (42, 'Constituency Assistant', 'Eve Martin', 'Liberal', 'Ontario', NULL);

INSERT INTO mv_contacts_senators_and_staffers (id, person_type, full_name)
VALUES (8, 'Senator', 'Fay Ouellet');
";

// ─── Fakes ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeGateway {
  fail:     AtomicBool,
  requests: Mutex<Vec<IntentRequest>>,
}

impl PaymentGateway for FakeGateway {
  async fn create_intent<'a>(&'a self, request: &'a IntentRequest) -> caucus_core::Result<PaymentIntent> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(Error::upstream("payment gateway", "connection refused"));
    }
    let mut requests = self.requests.lock().unwrap();
    requests.push(request.clone());
    Ok(PaymentIntent {
      id:            format!("pi_test_{}", requests.len()),
      client_secret: format!("pi_test_{}_secret", requests.len()),
    })
  }
}

#[derive(Default)]
struct FakeStorage {
  fail:    AtomicBool,
  puts:    AtomicUsize,
  objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl ObjectStorage for FakeStorage {
  async fn put<'a>(&'a self, key: &'a str, content: Vec<u8>, _: &'a str) -> caucus_core::Result<String> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(Error::upstream("storage", "503 Service Unavailable"));
    }
    self.puts.fetch_add(1, Ordering::SeqCst);
    self.objects.lock().unwrap().insert(key.to_owned(), content);
    Ok(self.url(key))
  }

  async fn exists<'a>(&'a self, key: &'a str) -> caucus_core::Result<bool> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(Error::upstream("storage", "503 Service Unavailable"));
    }
    Ok(self.objects.lock().unwrap().contains_key(key))
  }

  fn url(&self, key: &str) -> String { format!("https://blobs.example/{key}") }
}

#[derive(Default)]
struct FakeMailer {
  fail: AtomicBool,
  sent: Mutex<Vec<Email>>,
}

impl Mailer for FakeMailer {
  async fn send<'a>(&'a self, email: &'a Email) -> caucus_core::Result<()> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(Error::upstream("email", "rate limited"));
    }
    self.sent.lock().unwrap().push(email.clone());
    Ok(())
  }
}

struct TestBackend;

impl Backend for TestBackend {
  type Store = SqliteStore;
  type Gateway = FakeGateway;
  type Storage = FakeStorage;
  type Mailer = FakeMailer;
}

struct Harness {
  market:  Marketplace<TestBackend>,
  store:   Arc<SqliteStore>,
  gateway: Arc<FakeGateway>,
  storage: Arc<FakeStorage>,
  mailer:  Arc<FakeMailer>,
}

async fn harness_with(configure: impl FnOnce(&mut MarketConfig)) -> Harness {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  store.execute_batch(FIXTURE).await.expect("fixture");
  let store = Arc::new(store);
  let gateway = Arc::new(FakeGateway::default());
  let storage = Arc::new(FakeStorage::default());
  let mailer = Arc::new(FakeMailer::default());

  let mut config = MarketConfig {
    base_url: "https://caucus.example/api".into(),
    webhook_secret: SECRET.into(),
    ..MarketConfig::default()
  };
  configure(&mut config);

  let market = Marketplace::new(
    store.clone(),
    gateway.clone(),
    storage.clone(),
    mailer.clone(),
    config,
  );
  Harness { market, store, gateway, storage, mailer }
}

async fn harness() -> Harness { harness_with(|_| {}).await }

fn checkout_request(contacts: Vec<ContactRef>) -> CheckoutRequest {
  CheckoutRequest {
    buyer_id: "b1".into(),
    contacts,
    amount: None,
    email: Some("buyer@example.com".into()),
  }
}

fn event(kind: &str, order_id: i64, reference: &str) -> Vec<u8> {
  serde_json::json!({
    "type": kind,
    "data": {"object": {
      "id": reference,
      "amount": 4900,
      "metadata": {"orderId": order_id.to_string(), "userId": "b1", "contactCount": "3"}
    }}
  })
  .to_string()
  .into_bytes()
}

fn signed(payload: &[u8]) -> String {
  WebhookVerifier::new(SECRET)
    .sign(payload, Utc::now().timestamp())
    .unwrap()
}

// ─── Checkout ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn checkout_creates_pending_order_with_intent() {
  let h = harness().await;
  let checkout = h
    .market
    .machine()
    .checkout(checkout_request(vec![ContactRef::bare(1), ContactRef::bare(2), ContactRef::bare(3)]))
    .await
    .unwrap();

  assert_eq!(checkout.order.status, OrderStatus::Pending);
  assert_eq!(checkout.order.amount, 4900);
  assert_eq!(checkout.order.currency, "cad");
  assert_eq!(checkout.order.payment_reference.as_deref(), Some("pi_test_1"));
  assert_eq!(checkout.client_secret, "pi_test_1_secret");

  let requests = h.gateway.requests.lock().unwrap();
  assert_eq!(requests.len(), 1);
  assert_eq!(requests[0].amount, 4900);
  assert_eq!(requests[0].currency, "cad");
  assert_eq!(requests[0].metadata.order_id, checkout.order.id.to_string());
  assert_eq!(requests[0].metadata.buyer_id, "b1");
  assert_eq!(requests[0].metadata.contact_count, "3");
}

#[tokio::test]
async fn gateway_failure_leaves_no_pending_order() {
  let h = harness().await;
  h.gateway.fail.store(true, Ordering::SeqCst);

  let err = h
    .market
    .machine()
    .checkout(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UpstreamUnavailable { .. }));

  let orders = h.store.list_orders("b1").await.unwrap();
  assert_eq!(orders.len(), 1);
  assert_eq!(orders[0].status, OrderStatus::Failed);
}

#[tokio::test]
async fn checkout_validates_before_touching_the_gateway() {
  let h = harness().await;
  let mut request = checkout_request(vec![ContactRef::bare(1)]);
  request.buyer_id = "  ".into();
  let err = h.market.machine().checkout(request).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  assert!(h.gateway.requests.lock().unwrap().is_empty());
}

// ─── Bypass ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bypass_is_disabled_by_default() {
  let h = harness().await;
  let err = h
    .market
    .machine()
    .complete_without_payment(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::BypassDisabled));
  assert!(h.store.list_orders("b1").await.unwrap().is_empty());
}

#[tokio::test]
async fn enabled_bypass_completes_without_gateway() {
  let h = harness_with(|c| c.machine.allow_payment_bypass = true).await;
  let order = h
    .market
    .machine()
    .complete_without_payment(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap();
  assert_eq!(order.status, OrderStatus::Completed);
  assert!(h.gateway.requests.lock().unwrap().is_empty());

  let artifact = h.market.download(order.id).await.unwrap();
  assert_eq!(artifact.contact_count, 1);
}

// ─── Webhooks ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn paid_order_is_fulfilled_once_across_redeliveries() {
  let h = harness().await;
  let checkout = h
    .market
    .machine()
    .checkout(checkout_request(vec![ContactRef::bare(1), ContactRef::bare(2), ContactRef::bare(3)]))
    .await
    .unwrap();
  let id = checkout.order.id;

  let payload = event("payment_intent.succeeded", id, "pi_test_1");
  let outcome = h.market.handle_webhook(&payload, Some(signed(&payload).as_str())).await.unwrap();
  assert_eq!(
    outcome,
    WebhookOutcome::Completed { order_id: id, notification: Some(NotifyOutcome::Sent) }
  );

  let order = h.store.get_order(id).await.unwrap().unwrap();
  assert_eq!(order.status, OrderStatus::Completed);
  let key = artifact_key(id, 3);
  assert!(h.storage.objects.lock().unwrap().contains_key(&key));

  {
    let sent = h.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "buyer@example.com");
    assert_eq!(sent[0].subject, format!("Your Parliamentary Contact List is Ready - Order #{id}"));
    assert!(sent[0].text.contains("$49.00 CAD"));
    assert!(sent[0].text.contains(&format!("https://blobs.example/{key}")));
  }

  // The gateway redelivers: nothing new happens.
  let outcome = h.market.handle_webhook(&payload, Some(signed(&payload).as_str())).await.unwrap();
  assert_eq!(outcome, WebhookOutcome::AlreadyCompleted { order_id: id });
  assert_eq!(h.mailer.sent.lock().unwrap().len(), 1);
  assert_eq!(h.storage.puts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failure_after_completion_is_an_anomaly() {
  let h = harness_with(|c| c.machine.allow_payment_bypass = true).await;
  let order = h
    .market
    .machine()
    .complete_without_payment(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap();

  let err = h.market.machine().mark_failed(order.id, None).await.unwrap_err();
  assert!(matches!(
    err,
    Error::AnomalousTransition {
      current: OrderStatus::Completed,
      attempted: OrderStatus::Failed,
      ..
    }
  ));

  // Over the webhook the anomaly is acknowledged, not retried.
  let payload = event("payment_intent.payment_failed", order.id, "pi_late");
  let outcome = h.market.handle_webhook(&payload, Some(signed(&payload).as_str())).await.unwrap();
  assert_eq!(outcome, WebhookOutcome::Anomalous { order_id: order.id });

  let current = h.store.get_order(order.id).await.unwrap().unwrap();
  assert_eq!(current.status, OrderStatus::Completed);
}

#[tokio::test]
async fn payment_failure_fails_the_order_idempotently() {
  let h = harness().await;
  let checkout = h
    .market
    .machine()
    .checkout(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap();
  let id = checkout.order.id;

  let payload = event("payment_intent.payment_failed", id, "pi_test_1");
  let first = h.market.handle_webhook(&payload, Some(signed(&payload).as_str())).await.unwrap();
  let second = h.market.handle_webhook(&payload, Some(signed(&payload).as_str())).await.unwrap();
  assert_eq!(first, WebhookOutcome::Failed { order_id: id });
  assert_eq!(second, WebhookOutcome::AlreadyFailed { order_id: id });
  assert!(h.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mismatched_reference_is_an_anomaly() {
  let h = harness().await;
  let checkout = h
    .market
    .machine()
    .checkout(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap();

  let err = h
    .market
    .machine()
    .mark_completed(checkout.order.id, Some("pi_someone_else".into()))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AnomalousTransition { .. }));
  let current = h.store.get_order(checkout.order.id).await.unwrap().unwrap();
  assert_eq!(current.status, OrderStatus::Pending);
}

#[tokio::test]
async fn unverifiable_webhook_changes_nothing() {
  let h = harness().await;
  let checkout = h
    .market
    .machine()
    .checkout(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap();
  let payload = event("payment_intent.succeeded", checkout.order.id, "pi_test_1");

  let forged = WebhookVerifier::new("whsec_attacker")
    .sign(&payload, Utc::now().timestamp())
    .unwrap();
  for signature in [None, Some("t=1,v1=00"), Some(forged.as_str())] {
    let err = h.market.handle_webhook(&payload, signature).await.unwrap_err();
    assert!(matches!(err, Error::SignatureInvalid(_)));
  }

  let current = h.store.get_order(checkout.order.id).await.unwrap().unwrap();
  assert_eq!(current.status, OrderStatus::Pending);
  assert!(h.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn other_event_types_are_acknowledged() {
  let h = harness().await;
  let payload = br#"{"type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#;
  let outcome = h.market.handle_webhook(payload, Some(signed(payload).as_str())).await.unwrap();
  assert_eq!(outcome, WebhookOutcome::Ignored { event_type: "charge.refunded".into() });
}

#[tokio::test]
async fn mailer_failure_does_not_undo_completion() {
  let h = harness().await;
  h.mailer.fail.store(true, Ordering::SeqCst);
  let checkout = h
    .market
    .machine()
    .checkout(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap();
  let id = checkout.order.id;

  let payload = event("payment_intent.succeeded", id, "pi_test_1");
  let outcome = h.market.handle_webhook(&payload, Some(signed(&payload).as_str())).await.unwrap();
  assert_eq!(
    outcome,
    WebhookOutcome::Completed { order_id: id, notification: Some(NotifyOutcome::Failed) }
  );
  let current = h.store.get_order(id).await.unwrap().unwrap();
  assert_eq!(current.status, OrderStatus::Completed);
}

#[tokio::test]
async fn orders_without_email_skip_notification() {
  let h = harness().await;
  let mut request = checkout_request(vec![ContactRef::bare(1)]);
  request.email = None;
  let checkout = h.market.machine().checkout(request).await.unwrap();

  let payload = event("payment_intent.succeeded", checkout.order.id, "pi_test_1");
  let outcome = h.market.handle_webhook(&payload, Some(signed(&payload).as_str())).await.unwrap();
  assert_eq!(
    outcome,
    WebhookOutcome::Completed {
      order_id:     checkout.order.id,
      notification: Some(NotifyOutcome::Skipped),
    }
  );
}

// ─── Fulfillment ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_house_contacts_export_as_three_lines() {
  let h = harness().await;
  let contacts = h.store.fetch_by_ids(&[7, 42]).await;
  assert_eq!(contacts.len(), 2);
  assert!(contacts.iter().all(|c| c.segment() == caucus_core::segment::Segment::House));

  let text = crate::export::render(&contacts).unwrap();
  assert_eq!(text.lines().count(), 3);
}

#[tokio::test]
async fn storage_outage_falls_back_to_direct_delivery() {
  let h = harness_with(|c| c.machine.allow_payment_bypass = true).await;
  h.storage.fail.store(true, Ordering::SeqCst);
  let order = h
    .market
    .machine()
    .complete_without_payment(checkout_request(vec![ContactRef::bare(7), ContactRef::bare(42)]))
    .await
    .unwrap();

  let artifact = h.market.download(order.id).await.unwrap();
  match artifact.delivery {
    Delivery::Direct { content } => assert_eq!(content.lines().count(), 3),
    other => panic!("expected direct delivery, got {other:?}"),
  }
  assert_eq!(artifact.filename, format!("parliamentary-contacts-order-{}.csv", order.id));
}

#[tokio::test]
async fn email_links_the_download_route_when_storage_is_down() {
  let h = harness().await;
  h.storage.fail.store(true, Ordering::SeqCst);
  let checkout = h
    .market
    .machine()
    .checkout(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap();
  let id = checkout.order.id;

  let payload = event("payment_intent.succeeded", id, "pi_test_1");
  h.market.handle_webhook(&payload, Some(signed(&payload).as_str())).await.unwrap();

  let sent = h.mailer.sent.lock().unwrap();
  assert!(sent[0].text.contains(&format!("https://caucus.example/api/orders/{id}/download")));
}

#[tokio::test]
async fn repeated_downloads_reuse_the_stored_export() {
  let h = harness_with(|c| c.machine.allow_payment_bypass = true).await;
  let order = h
    .market
    .machine()
    .complete_without_payment(checkout_request(vec![ContactRef::bare(1), ContactRef::bare(2)]))
    .await
    .unwrap();

  let first = h.market.download(order.id).await.unwrap();
  let second = h.market.download(order.id).await.unwrap();
  assert_eq!(first.durable_url(), second.durable_url());
  assert!(first.durable_url().is_some());
  assert_eq!(h.storage.puts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pending_orders_cannot_be_downloaded() {
  let h = harness().await;
  let checkout = h
    .market
    .machine()
    .checkout(checkout_request(vec![ContactRef::bare(1)]))
    .await
    .unwrap();
  let err = h.market.download(checkout.order.id).await.unwrap_err();
  assert!(matches!(err, Error::NotFoundOrNotCompleted(_)));
  assert!(matches!(h.market.download(999).await, Err(Error::NotFoundOrNotCompleted(999))));
}

#[tokio::test]
async fn orders_resolving_to_nothing_are_an_error() {
  let h = harness_with(|c| c.machine.allow_payment_bypass = true).await;
  let order = h
    .market
    .machine()
    .complete_without_payment(checkout_request(vec![ContactRef::bare(999)]))
    .await
    .unwrap();
  let err = h.market.download(order.id).await.unwrap_err();
  assert!(matches!(err, Error::EmptyResultSet(_)));
}

#[tokio::test]
async fn scoped_refs_resolve_only_their_segment() {
  let h = harness_with(|c| c.machine.allow_payment_bypass = true).await;
  let order = h
    .market
    .machine()
    .complete_without_payment(checkout_request(vec![ContactRef::scoped(
      caucus_core::segment::Segment::Senate,
      8,
    )]))
    .await
    .unwrap();
  let artifact = h.market.download(order.id).await.unwrap();
  assert_eq!(artifact.contact_count, 1);
}

#[tokio::test]
async fn buyers_see_their_orders_newest_first() {
  let h = harness().await;
  let first = h.market.machine().checkout(checkout_request(vec![ContactRef::bare(1)])).await.unwrap();
  let second = h.market.machine().checkout(checkout_request(vec![ContactRef::bare(2)])).await.unwrap();

  let ids: Vec<i64> = h
    .market
    .machine()
    .orders_for_buyer("b1")
    .await
    .unwrap()
    .iter()
    .map(|o| o.id)
    .collect();
  assert_eq!(ids, vec![second.order.id, first.order.id]);
  assert!(matches!(h.market.machine().orders_for_buyer(" ").await, Err(Error::Validation(_))));
}
