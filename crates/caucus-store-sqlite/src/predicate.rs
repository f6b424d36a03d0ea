//! Predicate builder: turns a logical [`FilterSet`] into a parametrized
//! `WHERE` clause for one adapter.
//!
//! The clause only ever contains column names from the static adapter
//! tables and numbered placeholders. Every user-supplied value travels in
//! [`Predicate::params`].

use caucus_core::filter::{ABSENT, FilterKey, FilterSet, PRESENT};
use rusqlite::types::Value;

use crate::{
  adapter::{Adapter, ColumnSpec},
  functions::{CONTAINS, HAS_TOKEN, PRESENT as PRESENT_FN},
};

/// Role value of the office staffer included by `include_director`.
pub const DIRECTOR_ROLE: &str = "Legislative Director";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
  pub clause: String,
  pub params: Vec<Value>,
}

impl Predicate {
  /// Push a parameter and return its placeholder.
  pub fn bind(&mut self, value: impl Into<Value>) -> String {
    self.params.push(value.into());
    format!("?{}", self.params.len())
  }
}

pub fn build(adapter: &Adapter, filters: &FilterSet) -> Predicate {
  let mut predicate = Predicate::default();
  let mut conditions: Vec<String> = Vec::new();

  if let Some(text) = filters.search_text() {
    let group = adapter
      .search_columns
      .iter()
      .map(|col| {
        let p = predicate.bind(text.to_owned());
        format!("{CONTAINS}({col}, {p})")
      })
      .collect::<Vec<_>>()
      .join(" OR ");
    conditions.push(format!("({group})"));
  }

  for key in FilterKey::ALL {
    let values = filters.selected(key);
    if values.is_empty() {
      continue;
    }
    // Keys the segment does not declare are ignored.
    let Some(spec) = adapter.column(key) else { continue };

    let condition = match spec {
      ColumnSpec::Scalar(col) => {
        let placeholders = values
          .iter()
          .map(|v| predicate.bind(v.trim().to_owned()))
          .collect::<Vec<_>>()
          .join(", ");
        // Trimmed like the aggregator's values, so every option matches.
        Some(format!("TRIM(CAST({col} AS TEXT)) IN ({placeholders})"))
      }
      ColumnSpec::Delimited(col) => {
        let group = values
          .iter()
          .map(|v| {
            let p = predicate.bind((*v).to_owned());
            format!("{HAS_TOKEN}({col}, {p})")
          })
          .collect::<Vec<_>>()
          .join(" OR ");
        Some(format!("({group})"))
      }
      ColumnSpec::Presence(cols) => presence_condition(cols, &values),
    };

    let Some(mut condition) = condition else { continue };

    if key == FilterKey::Issue && filters.include_director {
      if let Some(role) = adapter.role_column {
        let p = predicate.bind(DIRECTOR_ROLE.to_owned());
        condition = format!("({condition} OR {role} = {p})");
      }
    }

    conditions.push(condition);
  }

  predicate.clause = if conditions.is_empty() {
    "1 = 1".to_owned()
  } else {
    conditions.join(" AND ")
  };
  predicate
}

fn presence_condition(cols: &[&str], values: &[&str]) -> Option<String> {
  let has = values.contains(&PRESENT);
  let none = values.contains(&ABSENT);
  let any = || {
    cols
      .iter()
      .map(|c| format!("{PRESENT_FN}({c})"))
      .collect::<Vec<_>>()
      .join(" OR ")
  };
  match (has, none) {
    (true, false) => Some(format!("({})", any())),
    (false, true) => Some(format!("NOT ({})", any())),
    // Both labels, or neither recognised: no restriction.
    _ => None,
  }
}
