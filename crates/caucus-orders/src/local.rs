//! Development adapters: exports on the local filesystem, emails to the log.

use std::path::{Path, PathBuf};

use caucus_core::{
  Result,
  ports::{Email, Mailer, ObjectStorage},
};

use crate::error::Error;

// ─── LocalStorage ────────────────────────────────────────────────────────────

/// Stores objects as files under `root` and hands out `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalStorage {
  root: PathBuf,
}

impl LocalStorage {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  fn path(&self, key: &str) -> PathBuf {
    // Keys are generated internally, but never let one climb out of root.
    let relative: PathBuf = key
      .split('/')
      .filter(|part| !part.is_empty() && *part != "." && *part != "..")
      .collect();
    self.root.join(relative)
  }
}

impl ObjectStorage for LocalStorage {
  async fn put<'a>(&'a self, key: &'a str, content: Vec<u8>, _content_type: &'a str) -> Result<String> {
    let path = self.path(key);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(Error::from)?;
    }
    tokio::fs::write(&path, content).await.map_err(Error::from)?;
    Ok(self.url(key))
  }

  async fn exists<'a>(&'a self, key: &'a str) -> Result<bool> {
    Ok(tokio::fs::try_exists(self.path(key)).await.map_err(Error::from)?)
  }

  fn url(&self, key: &str) -> String { format!("file://{}", self.path(key).display()) }
}

// ─── LogMailer ───────────────────────────────────────────────────────────────

/// Writes every email to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
  async fn send<'a>(&'a self, email: &'a Email) -> Result<()> {
    tracing::info!(to = %email.to, subject = %email.subject, body = %email.text, "email (not sent)");
    Ok(())
  }
}
