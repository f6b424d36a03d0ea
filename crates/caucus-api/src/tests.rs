//! Router tests: requests driven through [`api_router`] with `oneshot`.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use caucus_core::{
  Error,
  order::OrderStatus,
  ports::{Email, IntentRequest, Mailer, ObjectStorage, PaymentGateway, PaymentIntent},
};
use caucus_orders::{
  Backend, MarketConfig, Marketplace,
  webhook::{SIGNATURE_HEADER, WebhookVerifier},
};
use caucus_store_sqlite::SqliteStore;
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::api_router;

const SECRET: &str = "whsec_api";

const FIXTURE: &str = "
INSERT INTO mv_contacts_mp_and_constituency_assistants
  (id, person_type, full_name, political_party, province, email)
VALUES
  (1, 'MP', 'Carol Ng', 'NDP', 'Quebec', 'carol@parl.gc.ca'),
  (2, 'MP', 'Alice Tremblay', 'Liberal', 'Ontario', 'alice@parl.gc.ca'),
  (3, 'MP', 'Bob Singh', 'Conservative', 'Alberta', 'bob@parl.gc.ca');
";

// ─── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeGateway {
  calls: AtomicUsize,
}

impl PaymentGateway for FakeGateway {
  async fn create_intent<'a>(&'a self, _: &'a IntentRequest) -> caucus_core::Result<PaymentIntent> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(PaymentIntent { id: format!("pi_{n}"), client_secret: format!("pi_{n}_secret") })
  }
}

#[derive(Default)]
struct FakeStorage {
  down:    AtomicBool,
  objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl ObjectStorage for FakeStorage {
  async fn put<'a>(&'a self, key: &'a str, content: Vec<u8>, _: &'a str) -> caucus_core::Result<String> {
    if self.down.load(Ordering::SeqCst) {
      return Err(Error::upstream("storage", "unreachable"));
    }
    self.objects.lock().unwrap().insert(key.to_owned(), content);
    Ok(self.url(key))
  }

  async fn exists<'a>(&'a self, key: &'a str) -> caucus_core::Result<bool> {
    if self.down.load(Ordering::SeqCst) {
      return Err(Error::upstream("storage", "unreachable"));
    }
    Ok(self.objects.lock().unwrap().contains_key(key))
  }

  fn url(&self, key: &str) -> String { format!("https://blobs.example/{key}") }
}

#[derive(Default)]
struct FakeMailer {
  sent: Mutex<Vec<Email>>,
}

impl Mailer for FakeMailer {
  async fn send<'a>(&'a self, email: &'a Email) -> caucus_core::Result<()> {
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

struct App {
  router:  Router,
  storage: Arc<FakeStorage>,
  mailer:  Arc<FakeMailer>,
}

async fn app_with(configure: impl FnOnce(&mut MarketConfig)) -> App {
  let store = SqliteStore::open_in_memory().await.unwrap();
  store.execute_batch(FIXTURE).await.unwrap();
  let storage = Arc::new(FakeStorage::default());
  let mailer = Arc::new(FakeMailer::default());

  let mut config = MarketConfig {
    base_url: "https://caucus.example/api".into(),
    webhook_secret: SECRET.into(),
    ..MarketConfig::default()
  };
  configure(&mut config);

  let market = Marketplace::<TestBackend>::new(
    Arc::new(store),
    Arc::new(FakeGateway::default()),
    storage.clone(),
    mailer.clone(),
    config,
  );
  App { router: api_router(Arc::new(market)), storage, mailer }
}

async fn app() -> App { app_with(|_| {}).await }

async fn send(router: &Router, req: Request<Body>) -> Response {
  router.clone().oneshot(req).await.unwrap()
}

async fn get(router: &Router, uri: &str) -> Response {
  send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(router: &Router, uri: &str, body: Value) -> Response {
  let req = Request::post(uri)
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap();
  send(router, req).await
}

async fn deliver(router: &Router, payload: &str, signature: Option<&str>) -> Response {
  let mut builder = Request::post("/webhooks/payment");
  if let Some(sig) = signature {
    builder = builder.header(SIGNATURE_HEADER, sig);
  }
  send(router, builder.body(Body::from(payload.to_owned())).unwrap()).await
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(resp: Response) -> String {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  String::from_utf8(bytes.to_vec()).unwrap()
}

fn event(kind: &str, order_id: i64, reference: &str) -> String {
  json!({
    "type": kind,
    "data": {"object": {
      "id": reference,
      "metadata": {"orderId": order_id.to_string(), "buyerId": "b1", "contactCount": "3"}
    }}
  })
  .to_string()
}

fn sign(payload: &str) -> String {
  WebhookVerifier::new(SECRET).sign(payload.as_bytes(), Utc::now().timestamp()).unwrap()
}

async fn checkout(router: &Router) -> i64 {
  let resp = post_json(
    router,
    "/checkout",
    json!({"buyer_id": "b1", "contacts": [1, 2, 3], "email": "buyer@example.com"}),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  json_body(resp).await["order_id"].as_i64().unwrap()
}

async fn pay(router: &Router, order_id: i64) {
  let payload = event("payment_intent.succeeded", order_id, "pi_1");
  let resp = deliver(router, &payload, Some(&sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);
}

// ─── Directory ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_ok() {
  let app = app().await;
  let resp = get(&app.router, "/health").await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["status"], "ok");
}

#[tokio::test]
async fn contacts_are_listed_by_name_with_display_fields() {
  let app = app().await;
  let resp = get(&app.router, "/contacts?topline=house&limit=2").await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(resp).await;
  assert_eq!(body["segment"], "house");
  let contacts = body["contacts"].as_array().unwrap();
  assert_eq!(contacts.len(), 2);
  assert_eq!(contacts[0]["full_name"], "Alice Tremblay");
  assert_eq!(contacts[0]["segment"], "house");
  assert_eq!(contacts[0]["display"]["affiliation"], "Liberal");
  assert_eq!(contacts[1]["full_name"], "Bob Singh");
}

#[tokio::test]
async fn repeated_filter_values_are_ored() {
  let app = app().await;
  let resp = get(&app.router, "/contacts?party=NDP&party=Liberal").await;
  let body = json_body(resp).await;
  let names: Vec<&str> = body["contacts"]
    .as_array()
    .unwrap()
    .iter()
    .map(|c| c["full_name"].as_str().unwrap())
    .collect();
  assert_eq!(names, vec!["Alice Tremblay", "Carol Ng"]);
}

#[tokio::test]
async fn unknown_topline_falls_back_to_house() {
  let app = app().await;
  let body = json_body(get(&app.router, "/contacts?topline=municipal").await).await;
  assert_eq!(body["segment"], "house");
  assert_eq!(body["contacts"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn malformed_limit_is_a_bad_request() {
  let app = app().await;
  let resp = get(&app.router, "/contacts?limit=lots").await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(json_body(resp).await["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn senate_linkedin_options_are_presence_labels() {
  let app = app().await;
  let resp = get(&app.router, "/filters?topline=senate").await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["segment"], "senate");
  assert_eq!(body["filters"]["linkedin"], json!(["has", "none"]));
}

// ─── Checkout ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn checkout_returns_order_and_client_secret() {
  let app = app().await;
  let resp = post_json(&app.router, "/checkout", json!({"buyer_id": "b1", "contacts": [1, 2, 3]})).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body = json_body(resp).await;
  assert!(body["order_id"].as_i64().is_some());
  assert_eq!(body["client_secret"], "pi_1_secret");
}

#[tokio::test]
async fn checkout_accepts_legacy_field_names() {
  let app = app().await;
  let resp = post_json(&app.router, "/checkout", json!({"userId": "b1", "contactIds": [1]})).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn checkout_without_contacts_is_rejected() {
  let app = app().await;
  let resp = post_json(&app.router, "/checkout", json!({"buyer_id": "b1", "contacts": []})).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let resp = post_json(&app.router, "/checkout", json!({"contacts": [1]})).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bypass_is_forbidden_unless_enabled() {
  let app = app().await;
  let body = json!({"buyer_id": "b1", "contacts": [1], "bypass": true});
  let resp = post_json(&app.router, "/checkout", body.clone()).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let app = app_with(|c| c.machine.allow_payment_bypass = true).await;
  let resp = post_json(&app.router, "/checkout", body).await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let body = json_body(resp).await;
  assert_eq!(body["bypass"], true);

  let order_id = body["order_id"].as_i64().unwrap();
  let resp = get(&app.router, &format!("/orders/{order_id}/download")).await;
  assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

// ─── Webhook ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unsigned_webhook_is_rejected_and_changes_nothing() {
  let app = app().await;
  let order_id = checkout(&app.router).await;
  let payload = event("payment_intent.succeeded", order_id, "pi_1");

  let resp = deliver(&app.router, &payload, None).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let resp = deliver(&app.router, &payload, Some("t=1,v1=deadbeef")).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let body = json_body(get(&app.router, "/orders?buyer_id=b1").await).await;
  assert_eq!(body["orders"][0]["status"], OrderStatus::Pending.as_str());
  assert!(app.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn paid_webhook_completes_once_and_mails_once() {
  let app = app().await;
  let order_id = checkout(&app.router).await;
  let payload = event("payment_intent.succeeded", order_id, "pi_1");

  let resp = deliver(&app.router, &payload, Some(&sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["outcome"], "completed");
  assert_eq!(body["order_id"], order_id);

  let resp = deliver(&app.router, &payload, Some(&sign(&payload))).await;
  assert_eq!(json_body(resp).await["outcome"], "already_completed");
  assert_eq!(app.mailer.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failure_after_completion_is_acknowledged_as_anomalous() {
  let app = app().await;
  let order_id = checkout(&app.router).await;
  pay(&app.router, order_id).await;

  let payload = event("payment_intent.payment_failed", order_id, "pi_1");
  let resp = deliver(&app.router, &payload, Some(&sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["outcome"], "anomalous");

  let body = json_body(get(&app.router, "/orders?buyer_id=b1").await).await;
  assert_eq!(body["orders"][0]["status"], "completed");
}

#[tokio::test]
async fn unrelated_events_are_ignored() {
  let app = app().await;
  let payload = json!({"type": "charge.refunded", "data": {"object": {}}}).to_string();
  let resp = deliver(&app.router, &payload, Some(&sign(&payload))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["outcome"], "ignored");
}

// ─── Orders & download ────────────────────────────────────────────────────────

#[tokio::test]
async fn orders_require_a_buyer_id() {
  let app = app().await;
  let resp = get(&app.router, "/orders").await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn download_redirects_to_stored_export() {
  let app = app().await;
  let order_id = checkout(&app.router).await;
  pay(&app.router, order_id).await;

  let resp = get(&app.router, &format!("/orders/{order_id}/download")).await;
  assert_eq!(resp.status(), StatusCode::SEE_OTHER);
  let location = resp.headers()[header::LOCATION].to_str().unwrap();
  assert!(location.starts_with("https://blobs.example/orders/"));
}

#[tokio::test]
async fn download_streams_csv_when_storage_is_down() {
  let app = app().await;
  app.storage.down.store(true, Ordering::SeqCst);
  let order_id = checkout(&app.router).await;
  pay(&app.router, order_id).await;

  let resp = get(&app.router, &format!("/orders/{order_id}/download")).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert!(resp.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
  assert_eq!(
    resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap(),
    format!("attachment; filename=\"parliamentary-contacts-order-{order_id}.csv\"")
  );

  let csv = text_body(resp).await;
  assert_eq!(csv.lines().count(), 4);
  assert!(csv.contains("Alice Tremblay"));

  let sent = app.mailer.sent.lock().unwrap();
  assert!(sent[0].text.contains(&format!("https://caucus.example/api/orders/{order_id}/download")));
}

#[tokio::test]
async fn download_of_unpaid_or_unknown_order_is_not_found() {
  let app = app().await;
  let order_id = checkout(&app.router).await;
  let resp = get(&app.router, &format!("/orders/{order_id}/download")).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = get(&app.router, "/orders/999/download").await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);

  let resp = get(&app.router, "/orders/abc/download").await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
