//! Filter keys and the logical [`FilterSet`] a buyer submits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label for "has a value" on presence-type filter keys.
pub const PRESENT: &str = "has";
/// Label for "has no value" on presence-type filter keys.
pub const ABSENT: &str = "none";

/// A logical filter dimension. Which keys exist, and which columns back them,
/// depends on the segment.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FilterKey {
  Category,
  Party,
  Province,
  Committee,
  Role,
  Issue,
  Linkedin,
}

impl FilterKey {
  pub const ALL: [FilterKey; 7] = [
    FilterKey::Category,
    FilterKey::Party,
    FilterKey::Province,
    FilterKey::Committee,
    FilterKey::Role,
    FilterKey::Issue,
    FilterKey::Linkedin,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Category => "category",
      Self::Party => "party",
      Self::Province => "province",
      Self::Committee => "committee",
      Self::Role => "role",
      Self::Issue => "issue",
      Self::Linkedin => "linkedin",
    }
  }

  /// Match a query-string parameter name. The plural `categories` is what
  /// older clients send.
  pub fn from_param(name: &str) -> Option<Self> {
    match name {
      "category" | "categories" => Some(Self::Category),
      "party" => Some(Self::Party),
      "province" => Some(Self::Province),
      "committee" => Some(Self::Committee),
      "role" => Some(Self::Role),
      "issue" => Some(Self::Issue),
      "linkedin" => Some(Self::Linkedin),
      _ => None,
    }
  }
}

/// Available values per filter key, as reported for one segment.
pub type FilterOptions = BTreeMap<FilterKey, Vec<String>>;

/// A buyer's logical search: free text plus selected values per key.
///
/// Values are not validated against the segment's options; a value that no
/// longer exists simply matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
  pub search:           Option<String>,
  #[serde(default)]
  pub selections:       BTreeMap<FilterKey, Vec<String>>,
  /// Widen issue matches to the office's legislative director.
  #[serde(default)]
  pub include_director: bool,
}

impl FilterSet {
  pub fn new() -> Self { Self::default() }

  pub fn with_search(mut self, text: impl Into<String>) -> Self {
    self.search = Some(text.into());
    self
  }

  pub fn with(
    mut self,
    key: FilterKey,
    values: impl IntoIterator<Item = impl Into<String>>,
  ) -> Self {
    self.selections.entry(key).or_default().extend(values.into_iter().map(Into::into));
    self
  }

  /// The trimmed search text, if any is left after trimming.
  pub fn search_text(&self) -> Option<&str> {
    self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
  }

  /// Selected values for `key`, with blanks dropped.
  pub fn selected(&self, key: FilterKey) -> Vec<&str> {
    self
      .selections
      .get(&key)
      .map(|vs| vs.iter().map(|v| v.trim()).filter(|v| !v.is_empty()).collect())
      .unwrap_or_default()
  }

  pub fn is_unfiltered(&self) -> bool {
    self.search_text().is_none()
      && FilterKey::ALL.iter().all(|k| self.selected(*k).is_empty())
  }
}
