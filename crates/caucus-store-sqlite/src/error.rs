//! Error type for `caucus-store-sqlite`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] caucus_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("{op} did not finish within {after:?}")]
  Timeout { op: &'static str, after: Duration },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for caucus_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      Error::Json(_) | Error::DateParse(_) => Self::DataIntegrity(e.to_string()),
      Error::Database(_) | Error::Timeout { .. } => Self::upstream("store", e),
    }
  }
}
