//! Filter-option aggregation: the distinct values a buyer can pick per key.

use std::{cmp::Ordering, collections::BTreeSet};

use caucus_core::filter::{ABSENT, FilterOptions, PRESENT};
use rusqlite::Connection;
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{
  adapter::{Adapter, ColumnSpec},
  functions::tokens,
};

/// Read the options for every key `adapter` declares.
///
/// Runs synchronously on the connection thread, so one failing column fails
/// the whole call.
pub fn collect_options(conn: &Connection, adapter: &Adapter) -> rusqlite::Result<FilterOptions> {
  let mut options = FilterOptions::new();

  for (key, spec) in adapter.filters {
    let values = match spec {
      ColumnSpec::Scalar(col) => sorted(distinct_text(conn, adapter.source, col)?),
      ColumnSpec::Delimited(col) => sorted(
        distinct_text(conn, adapter.source, col)?
          .iter()
          .flat_map(|raw| tokens(raw).map(str::to_owned))
          .collect::<BTreeSet<_>>()
          .into_iter()
          .collect(),
      ),
      ColumnSpec::Presence(_) => vec![PRESENT.to_owned(), ABSENT.to_owned()],
    };
    options.insert(*key, values);
  }

  Ok(options)
}

fn distinct_text(conn: &Connection, source: &str, col: &str) -> rusqlite::Result<Vec<String>> {
  let sql = format!(
    "SELECT DISTINCT TRIM(CAST({col} AS TEXT)) FROM {source}
     WHERE {col} IS NOT NULL AND TRIM(CAST({col} AS TEXT)) <> ''"
  );
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
  rows.collect()
}

fn sorted(mut values: Vec<String>) -> Vec<String> {
  values.sort_by(|a, b| collate(a, b));
  values
}

/// Base letters only: decomposed, combining marks dropped, lowercased.
fn fold(text: &str) -> String {
  text
    .nfd()
    .filter(|c| !is_combining_mark(*c))
    .flat_map(char::to_lowercase)
    .collect()
}

/// Orders by base letters, ignoring case and accents. Values equal at that
/// level fall back to lowercase, then the raw value.
pub fn collate(a: &str, b: &str) -> Ordering {
  fold(a)
    .cmp(&fold(b))
    .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
    .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sorting_ignores_case_but_stays_deterministic() {
    let mut values = vec!["ndp", "Liberal", "NDP", "Bloc"];
    values.sort_by(|a, b| collate(a, b));
    assert_eq!(values, vec!["Bloc", "Liberal", "NDP", "ndp"]);
  }

  #[test]
  fn accented_values_sort_with_their_base_letters() {
    let mut values = vec!["Yukon", "Île-du-Prince-Édouard", "Québec", "Alberta", "Quebec City"];
    values.sort_by(|a, b| collate(a, b));
    assert_eq!(
      values,
      vec!["Alberta", "Île-du-Prince-Édouard", "Québec", "Quebec City", "Yukon"]
    );

    let mut twins = vec!["Québec", "quebec", "Quebec"];
    twins.sort_by(|a, b| collate(a, b));
    assert_eq!(twins, vec!["Quebec", "quebec", "Québec"]);
  }
}
