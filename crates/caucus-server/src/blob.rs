//! Azure-Blob-compatible object storage over plain HTTP with SAS tokens.

use caucus_core::{Error, Result, ports::ObjectStorage};
use reqwest::{Client, StatusCode};

use crate::settings::AzureConfig;

const SERVICE: &str = "storage";

pub struct BlobStorage {
  client:        Client,
  container_url: String,
  write_sas:     String,
  read_sas:      String,
}

/// SAS tokens are configured with or without the leading `?`.
fn query(sas: &str) -> String {
  let sas = sas.trim().trim_start_matches('?');
  if sas.is_empty() { String::new() } else { format!("?{sas}") }
}

impl BlobStorage {
  pub fn new(client: Client, config: &AzureConfig) -> anyhow::Result<Self> {
    anyhow::ensure!(!config.sas_token.trim().is_empty(), "azure.sas_token is empty");
    let write_sas = query(&config.sas_token);
    let read_sas = config.read_sas_token.as_deref().map(query).unwrap_or_else(|| write_sas.clone());
    Ok(Self { client, container_url: config.container_url(), write_sas, read_sas })
  }

  fn blob_url(&self, key: &str, sas: &str) -> String {
    format!("{}/{}{sas}", self.container_url, key.trim_start_matches('/'))
  }
}

impl ObjectStorage for BlobStorage {
  async fn put<'a>(&'a self, key: &'a str, content: Vec<u8>, content_type: &'a str) -> Result<String> {
    let filename = key.rsplit('/').next().unwrap_or(key);
    let resp = self
      .client
      .put(self.blob_url(key, &self.write_sas))
      .header("x-ms-blob-type", "BlockBlob")
      .header("x-ms-blob-content-type", content_type)
      .header("x-ms-blob-content-disposition", format!("attachment; filename=\"{filename}\""))
      .body(content)
      .send()
      .await
      .map_err(|e| Error::upstream(SERVICE, e))?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::upstream(SERVICE, format!("PUT {key} → {status}")));
    }
    Ok(self.url(key))
  }

  async fn exists<'a>(&'a self, key: &'a str) -> Result<bool> {
    let resp = self
      .client
      .head(self.blob_url(key, &self.write_sas))
      .send()
      .await
      .map_err(|e| Error::upstream(SERVICE, e))?;

    match resp.status() {
      StatusCode::NOT_FOUND => Ok(false),
      s if s.is_success() => Ok(true),
      s => Err(Error::upstream(SERVICE, format!("HEAD {key} → {s}"))),
    }
  }

  fn url(&self, key: &str) -> String { self.blob_url(key, &self.read_sas) }
}
