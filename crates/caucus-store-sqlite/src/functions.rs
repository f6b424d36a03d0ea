//! SQL functions registered on every connection.
//!
//! Token splitting and presence checks are shared between the predicate
//! builder (in SQL) and the option aggregator (in Rust), so both agree on
//! what a committee name or a "has LinkedIn" value is.

use std::borrow::Cow;

use rusqlite::{Connection, functions::FunctionFlags, types::ValueRef};

/// `caucus_has_token(column, token)`: true when the comma-separated column
/// contains `token` after trimming.
pub const HAS_TOKEN: &str = "caucus_has_token";

/// `caucus_contains(column, needle)`: Unicode case-insensitive substring
/// match. SQLite's `LIKE` only folds ASCII.
pub const CONTAINS: &str = "caucus_contains";

/// `caucus_present(column)`: true when the column holds a meaningful value.
pub const PRESENT: &str = "caucus_present";

const DELIMITER: char = ',';

/// Non-empty trimmed tokens of a delimited value.
pub fn tokens(raw: &str) -> impl Iterator<Item = &str> {
  raw.split(DELIMITER).map(str::trim).filter(|t| !t.is_empty())
}

fn as_text(value: ValueRef<'_>) -> Option<Cow<'_, str>> {
  match value {
    ValueRef::Null | ValueRef::Blob(_) => None,
    ValueRef::Integer(i) => Some(Cow::Owned(i.to_string())),
    ValueRef::Real(f) => Some(Cow::Owned(f.to_string())),
    ValueRef::Text(t) => Some(String::from_utf8_lossy(t)),
  }
}

/// Legacy boolean columns store `f`, `false`, `0` or `no` for "absent"; any
/// other non-blank value counts as present.
pub fn is_present(value: ValueRef<'_>) -> bool {
  match as_text(value) {
    None => false,
    Some(text) => {
      let text = text.trim().to_ascii_lowercase();
      !text.is_empty() && !matches!(text.as_str(), "f" | "false" | "0" | "no")
    }
  }
}

pub fn contains_folded(haystack: &str, needle: &str) -> bool {
  haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn register(conn: &Connection) -> rusqlite::Result<()> {
  let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

  conn.create_scalar_function(HAS_TOKEN, 2, flags, |ctx| {
    let haystack = as_text(ctx.get_raw(0));
    let needle = as_text(ctx.get_raw(1));
    Ok(match (haystack, needle) {
      (Some(h), Some(n)) => tokens(&h).any(|t| t == n.trim()),
      _ => false,
    })
  })?;

  conn.create_scalar_function(CONTAINS, 2, flags, |ctx| {
    let haystack = as_text(ctx.get_raw(0));
    let needle = as_text(ctx.get_raw(1));
    Ok(match (haystack, needle) {
      (Some(h), Some(n)) => contains_folded(&h, &n),
      _ => false,
    })
  })?;

  conn.create_scalar_function(PRESENT, 1, flags, |ctx| Ok(is_present(ctx.get_raw(0))))?;

  Ok(())
}
