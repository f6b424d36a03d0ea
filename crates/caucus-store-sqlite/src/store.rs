//! [`SqliteStore`], the SQLite implementation of [`Directory`] and
//! [`OrderStore`].

use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  future::Future,
  path::Path,
  time::Duration,
};

use chrono::Utc;
use futures::future::join_all;
use rusqlite::{OptionalExtension as _, params_from_iter, types::Value};

use caucus_core::{
  contact::{Contact, ContactKey},
  directory::{Directory, Page},
  filter::{FilterOptions, FilterSet},
  order::{ContactRef, NewOrder, Order, OrderStatus, OrderStore},
  segment::Segment,
};

use crate::{
  Error, Result,
  adapter::resolve_adapter,
  encode::{ORDER_COLUMNS, RawOrder, contact_from_row, encode_dt, encode_refs},
  functions,
  options::collect_options,
  predicate,
  schema::{DIRECTORY_SCHEMA, ORDERS_SCHEMA},
};

/// Default bound on a single directory query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Store ───────────────────────────────────────────────────────────────────

/// The Caucus directory and order book, backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:          tokio_rusqlite::Connection,
  query_timeout: Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path`. The directory views must already
  /// exist; only the `orders` table is created.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    conn
      .call(|conn| {
        functions::register(conn)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
          row.get::<_, String>(0)
        })?;
        conn.execute_batch(ORDERS_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, query_timeout: DEFAULT_QUERY_TIMEOUT })
  }

  /// Open an in-memory store with empty directory tables, for
  /// development and testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    conn
      .call(|conn| {
        functions::register(conn)?;
        conn.execute_batch(ORDERS_SCHEMA)?;
        conn.execute_batch(DIRECTORY_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, query_timeout: DEFAULT_QUERY_TIMEOUT })
  }

  pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
    self.query_timeout = timeout;
    self
  }

  /// Run raw SQL, e.g. to load a directory snapshot into a development store.
  pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<()> {
    let sql = sql.into();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  async fn bounded<T>(
    &self,
    op: &'static str,
    fut: impl Future<Output = tokio_rusqlite::Result<T>>,
  ) -> Result<T> {
    match tokio::time::timeout(self.query_timeout, fut).await {
      Ok(result) => Ok(result?),
      Err(_) => Err(Error::Timeout { op, after: self.query_timeout }),
    }
  }

  async fn search_rows(
    &self,
    segment: Segment,
    filters: &FilterSet,
    page: Page,
  ) -> Result<Vec<Contact>> {
    let adapter = resolve_adapter(segment);
    let mut predicate = predicate::build(adapter, filters);
    let limit = predicate.bind(i64::from(page.limit));
    let offset = predicate.bind(i64::from(page.offset));

    let sql = format!(
      "SELECT {} FROM {} WHERE {} ORDER BY {} COLLATE NOCASE ASC, id ASC \
       LIMIT {limit} OFFSET {offset}",
      adapter.select_list(),
      adapter.source,
      predicate.clause,
      adapter.sort_key,
    );
    let params = predicate.params;

    self
      .bounded(
        "search",
        self.conn.call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| contact_from_row(segment, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        }),
      )
      .await
  }

  async fn rows_by_id(&self, segment: Segment, ids: BTreeSet<i64>) -> Result<Vec<Contact>> {
    let adapter = resolve_adapter(segment);
    let placeholders = (1..=ids.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
    let sql = format!(
      "SELECT {} FROM {} WHERE id IN ({placeholders}) ORDER BY id",
      adapter.select_list(),
      adapter.source,
    );
    let params: Vec<Value> = ids.into_iter().map(Value::from).collect();

    self
      .bounded(
        "fetch_by_ids",
        self.conn.call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| contact_from_row(segment, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        }),
      )
      .await
  }

  async fn orders_query(
    &self,
    sql: String,
    params: Vec<Value>,
  ) -> Result<Vec<Order>> {
    let raws: Vec<RawOrder> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params.iter()), RawOrder::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOrder::into_order).collect()
  }

  async fn order_row(&self, sql: String, params: Vec<Value>) -> Result<Option<Order>> {
    let raw: Option<RawOrder> = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, params_from_iter(params.iter()), RawOrder::from_row).optional()?)
      })
      .await?;

    raw.map(RawOrder::into_order).transpose()
  }
}

// ─── Directory impl ──────────────────────────────────────────────────────────

impl Directory for SqliteStore {
  async fn search<'a>(
    &'a self,
    segment: Segment,
    filters: &'a FilterSet,
    page: Page,
  ) -> caucus_core::Result<Vec<Contact>> {
    Ok(self.search_rows(segment, filters, page).await?)
  }

  async fn filter_options(&self, segment: Segment) -> caucus_core::Result<FilterOptions> {
    let adapter = resolve_adapter(segment);
    let options = self
      .bounded(
        "filter_options",
        self.conn.call(move |conn| Ok(collect_options(conn, adapter)?)),
      )
      .await?;
    Ok(options)
  }

  async fn fetch_by_ids<'a>(&'a self, ids: &'a [i64]) -> Vec<Contact> {
    let refs: Vec<ContactRef> = ids.iter().copied().map(ContactRef::bare).collect();
    self.fetch_by_refs(&refs).await
  }

  async fn fetch_by_refs<'a>(&'a self, refs: &'a [ContactRef]) -> Vec<Contact> {
    let mut wanted: BTreeMap<Segment, BTreeSet<i64>> = BTreeMap::new();
    for r in refs {
      match r.segment {
        Some(segment) => {
          wanted.entry(segment).or_default().insert(r.id);
        }
        None => {
          for segment in Segment::ALL {
            wanted.entry(segment).or_default().insert(r.id);
          }
        }
      }
    }

    let lookups = wanted
      .into_iter()
      .map(|(segment, ids)| async move { (segment, self.rows_by_id(segment, ids).await) });

    let mut found: HashMap<ContactKey, Contact> = HashMap::new();
    for (segment, result) in join_all(lookups).await {
      match result {
        Ok(rows) => {
          for contact in rows {
            found.insert(contact.key(), contact);
          }
        }
        Err(e) => {
          tracing::error!(
            %segment,
            error = %e,
            "segment lookup failed; its contacts are missing from the result"
          );
        }
      }
    }

    // Keep the caller's order; each key is emitted once.
    let mut contacts = Vec::with_capacity(found.len());
    for r in refs {
      let segments: &[Segment] = match &r.segment {
        Some(segment) => std::slice::from_ref(segment),
        None => &Segment::ALL,
      };
      for segment in segments {
        if let Some(contact) = found.remove(&ContactKey { segment: *segment, id: r.id }) {
          contacts.push(contact);
        }
      }
    }
    contacts
  }
}

// ─── OrderStore impl ─────────────────────────────────────────────────────────

impl OrderStore for SqliteStore {
  async fn insert_order(&self, input: NewOrder) -> caucus_core::Result<Order> {
    input.validate()?;

    let contacts = encode_refs(&input.contacts)?;
    let now = encode_dt(Utc::now());
    let sql = format!(
      "INSERT INTO orders (
         buyer_id, contact_ids, amount, currency, status, notify_email, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?6)
       RETURNING {ORDER_COLUMNS}"
    );
    let params = vec![
      Value::from(input.buyer_id.trim().to_owned()),
      Value::from(contacts),
      Value::from(input.amount),
      Value::from(input.currency.trim().to_lowercase()),
      input.notify_email.map_or(Value::Null, Value::from),
      Value::from(now),
    ];

    self
      .order_row(sql, params)
      .await?
      .ok_or_else(|| caucus_core::Error::DataIntegrity("insert returned no row".into()))
  }

  async fn get_order(&self, id: i64) -> caucus_core::Result<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    Ok(self.order_row(sql, vec![Value::from(id)]).await?)
  }

  async fn list_orders<'a>(&'a self, buyer_id: &'a str) -> caucus_core::Result<Vec<Order>> {
    let sql = format!(
      "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = ?1 \
       ORDER BY created_at DESC, id DESC"
    );
    Ok(self.orders_query(sql, vec![Value::from(buyer_id.to_owned())]).await?)
  }

  async fn attach_payment_reference(
    &self,
    id: i64,
    reference: String,
  ) -> caucus_core::Result<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET payment_reference = ?2, updated_at = ?3
       WHERE id = ?1 AND status = 'pending'
       RETURNING {ORDER_COLUMNS}"
    );
    let params = vec![Value::from(id), Value::from(reference), Value::from(encode_dt(Utc::now()))];
    Ok(self.order_row(sql, params).await?)
  }

  async fn transition_from_pending(
    &self,
    id: i64,
    to: OrderStatus,
    reference: Option<String>,
  ) -> caucus_core::Result<Option<Order>> {
    if !to.is_terminal() {
      return Err(caucus_core::Error::Validation(format!(
        "order {id} can only leave pending for a terminal status"
      )));
    }

    // Single compare-and-set statement; concurrent deliveries cannot both
    // apply.
    let sql = format!(
      "UPDATE orders
       SET status = ?2,
           payment_reference = COALESCE(?3, payment_reference),
           updated_at = ?4
       WHERE id = ?1 AND status = 'pending'
       RETURNING {ORDER_COLUMNS}"
    );
    let params = vec![
      Value::from(id),
      Value::from(to.as_str().to_owned()),
      reference.map_or(Value::Null, Value::from),
      Value::from(encode_dt(Utc::now())),
    ];
    Ok(self.order_row(sql, params).await?)
  }
}
