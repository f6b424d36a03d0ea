//! Error type for the local adapters and the CSV export.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("export is not valid UTF-8: {0}")]
  Utf8(#[from] std::string::FromUtf8Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl From<Error> for caucus_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Csv(_) | Error::Utf8(_) => Self::DataIntegrity(e.to_string()),
      Error::Io(_) => Self::upstream("storage", e),
    }
  }
}
