//! Handlers for directory browsing.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contacts` | `?topline=&search=&<filter key>=…&limit=&offset=&includeDirector=` |
//! | `GET`  | `/filters`  | `?topline=`; option values per filter key |
//!
//! Filter keys may repeat (`?party=Liberal&party=NDP`). An unknown `topline`
//! falls back to the House segment.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use caucus_core::{
  contact::{Contact, ContactDisplay},
  directory::{Directory, Page},
  filter::{FilterKey, FilterOptions, FilterSet},
  segment::Segment,
};
use caucus_orders::{Backend, Marketplace};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Largest page a single request may ask for.
pub const MAX_LIMIT: u32 = 1000;

fn segment_for(topline: Option<&str>) -> Segment {
  let (segment, fell_back) = Segment::from_selector(topline);
  if fell_back {
    tracing::warn!(topline = ?topline, fallback = %segment, "unknown segment selector");
  }
  segment
}

// ─── Search ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
pub struct SearchParams {
  pub topline: Option<String>,
  pub filters: FilterSet,
  pub page:    Page,
}

impl SearchParams {
  /// Parse raw query pairs. Unrecognised parameter names are ignored.
  pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ApiError> {
    let mut params = Self::default();
    for (name, value) in pairs {
      match name.as_str() {
        "topline" => params.topline = Some(value),
        "search" => params.filters.search = Some(value),
        "limit" => params.page.limit = parse_number(&name, &value)?.min(MAX_LIMIT),
        "offset" => params.page.offset = parse_number(&name, &value)?,
        "includeDirector" => {
          params.filters.include_director = matches!(value.as_str(), "true" | "1")
        }
        other => {
          if let Some(key) = FilterKey::from_param(other) {
            params.filters.selections.entry(key).or_default().push(value);
          }
        }
      }
    }
    Ok(params)
  }
}

fn parse_number(name: &str, value: &str) -> Result<u32, ApiError> {
  value
    .trim()
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("{name} must be a non-negative integer")))
}

#[derive(Debug, Serialize)]
pub struct ListedContact {
  #[serde(flatten)]
  pub contact: Contact,
  pub display: ContactDisplay,
}

#[derive(Debug, Serialize)]
pub struct ContactsResponse {
  pub segment:  Segment,
  pub contacts: Vec<ListedContact>,
}

/// `GET /contacts`
pub async fn search<B: Backend>(
  State(market): State<Arc<Marketplace<B>>>,
  Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ContactsResponse>, ApiError> {
  let params = SearchParams::from_pairs(pairs)?;
  let segment = segment_for(params.topline.as_deref());

  let contacts = market
    .directory()
    .search(segment, &params.filters, params.page)
    .await?
    .into_iter()
    .map(|contact| ListedContact { display: contact.display(), contact })
    .collect();

  Ok(Json(ContactsResponse { segment, contacts }))
}

// ─── Filter options ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FiltersParams {
  pub topline: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FiltersResponse {
  pub segment: Segment,
  pub filters: FilterOptions,
}

/// `GET /filters`
pub async fn filters<B: Backend>(
  State(market): State<Arc<Marketplace<B>>>,
  Query(params): Query<FiltersParams>,
) -> Result<Json<FiltersResponse>, ApiError> {
  let segment = segment_for(params.topline.as_deref());
  let filters = market.directory().filter_options(segment).await?;
  Ok(Json(FiltersResponse { segment, filters }))
}
