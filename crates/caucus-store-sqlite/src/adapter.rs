//! Schema adapter registry: how each segment's source spells the logical
//! filter keys.
//!
//! Everything here is static. Column and view names in generated SQL come
//! only from these tables, never from request input.

use caucus_core::{contact::ContactDetails, filter::FilterKey, segment::Segment};

/// The value shape of a filter key in one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSpec {
  /// One value per row.
  Scalar(&'static str),
  /// Several comma-separated values in one column.
  Delimited(&'static str),
  /// A has / has-not signal, true when any of the columns holds a value.
  Presence(&'static [&'static str]),
}

#[derive(Debug)]
pub struct Adapter {
  pub segment:        Segment,
  /// View (or table) name.
  pub source:         &'static str,
  pub sort_key:       &'static str,
  /// "Display name" columns searched by free text.
  pub search_columns: &'static [&'static str],
  pub filters:        &'static [(FilterKey, ColumnSpec)],
  /// Column holding the person's role; used for the director fallback.
  pub role_column:    Option<&'static str>,
}

impl Adapter {
  pub fn column(&self, key: FilterKey) -> Option<ColumnSpec> {
    self.filters.iter().find(|(k, _)| *k == key).map(|(_, spec)| *spec)
  }

  /// `SELECT` list that reads every contact column as text.
  pub fn select_list(&self) -> String {
    std::iter::once("id".to_owned())
      .chain(
        ContactDetails::columns(self.segment)
          .iter()
          .map(|c| format!("CAST({c} AS TEXT) AS {c}")),
      )
      .collect::<Vec<_>>()
      .join(", ")
  }
}

static HOUSE: Adapter = Adapter {
  segment:        Segment::House,
  source:         "mv_contacts_mp_and_constituency_assistants",
  sort_key:       "full_name",
  search_columns: &["full_name", "title", "mp_name", "riding"],
  filters:        &[
    (FilterKey::Category, ColumnSpec::Scalar("person_type")),
    (FilterKey::Province, ColumnSpec::Scalar("province")),
    (FilterKey::Party, ColumnSpec::Scalar("political_party")),
    (FilterKey::Committee, ColumnSpec::Delimited("committees")),
    (FilterKey::Role, ColumnSpec::Scalar("person_type")),
    (FilterKey::Issue, ColumnSpec::Delimited("parliamentary_offices")),
  ],
  role_column:    Some("person_type"),
};

static SENATE: Adapter = Adapter {
  segment:        Segment::Senate,
  source:         "mv_contacts_senators_and_staffers",
  sort_key:       "full_name",
  search_columns: &["full_name", "title", "senator_name"],
  filters:        &[
    (FilterKey::Category, ColumnSpec::Scalar("person_type")),
    (FilterKey::Province, ColumnSpec::Scalar("senator_province")),
    (FilterKey::Party, ColumnSpec::Scalar("senator_affiliation")),
    (FilterKey::Committee, ColumnSpec::Delimited("committees")),
    (FilterKey::Role, ColumnSpec::Scalar("person_type")),
    (FilterKey::Issue, ColumnSpec::Delimited("parliamentary_offices")),
    (
      FilterKey::Linkedin,
      ColumnSpec::Presence(&[
        "linkedin_url",
        "senator_linkedin_found",
        "senator_linkedin_url",
      ]),
    ),
  ],
  role_column:    Some("person_type"),
};

static PROVINCIAL: Adapter = Adapter {
  segment:        Segment::Provincial,
  source:         "mv_provincial_legislator_contacts",
  sort_key:       "full_name",
  search_columns: &["full_name", "constituency"],
  filters:        &[
    (FilterKey::Category, ColumnSpec::Scalar("person_type")),
    (FilterKey::Province, ColumnSpec::Scalar("province")),
    (FilterKey::Party, ColumnSpec::Scalar("party")),
    (FilterKey::Committee, ColumnSpec::Delimited("committees")),
    (FilterKey::Role, ColumnSpec::Scalar("person_type")),
    // No issue key: profile_summary is free text, not an option list.
  ],
  role_column:    Some("person_type"),
};

pub fn resolve_adapter(segment: Segment) -> &'static Adapter {
  match segment {
    Segment::House => &HOUSE,
    Segment::Senate => &SENATE,
    Segment::Provincial => &PROVINCIAL,
  }
}

/// Resolve a raw selector, falling back to the default segment for unknown
/// values.
pub fn resolve_selector(selector: Option<&str>) -> &'static Adapter {
  let (segment, fell_back) = Segment::from_selector(selector);
  if fell_back {
    tracing::warn!(
      selector = selector.unwrap_or_default(),
      fallback = %segment,
      "unknown segment selector; using default segment"
    );
  }
  resolve_adapter(segment)
}
