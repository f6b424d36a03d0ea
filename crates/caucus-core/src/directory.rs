//! The `Directory` trait: read access to the three contact segments.
//!
//! Implemented by storage backends (e.g. `caucus-store-sqlite`). The order
//! pipeline and the API depend on this abstraction only.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  contact::Contact,
  filter::{FilterOptions, FilterSet},
  order::ContactRef,
  segment::Segment,
};

/// Pagination window for [`Directory::search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
  pub limit:  u32,
  pub offset: u32,
}

impl Default for Page {
  fn default() -> Self { Self { limit: 100, offset: 0 } }
}

pub trait Directory: Send + Sync {
  /// Contacts in `segment` matching `filters`, ascending by display name,
  /// at most `page.limit` rows from `page.offset`.
  ///
  /// A store failure or timeout is an error, never an empty page.
  fn search<'a>(
    &'a self,
    segment: Segment,
    filters: &'a FilterSet,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Contact>>> + Send + 'a;

  /// Distinct values for every filter key `segment` declares. Fails as a
  /// whole if any column cannot be read.
  fn filter_options(
    &self,
    segment: Segment,
  ) -> impl Future<Output = Result<FilterOptions>> + Send + '_;

  /// Look `ids` up in every segment and union the results, deduplicated by
  /// `(segment, id)` only. A segment whose query fails contributes nothing.
  fn fetch_by_ids<'a>(
    &'a self,
    ids: &'a [i64],
  ) -> impl Future<Output = Vec<Contact>> + Send + 'a;

  /// Like [`Directory::fetch_by_ids`], but refs that name a segment are
  /// looked up only there.
  fn fetch_by_refs<'a>(
    &'a self,
    refs: &'a [ContactRef],
  ) -> impl Future<Output = Vec<Contact>> + Send + 'a;
}
