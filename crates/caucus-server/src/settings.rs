//! Runtime configuration, read from `config.toml` and `CAUCUS__*` variables.
//!
//! Every field has a default so the server starts with no file at all, in
//! development mode: local exports, emails to the log, no payment gateway.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use caucus_orders::{MarketConfig, machine::MachineConfig, webhook};
use serde::Deserialize;

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  /// Public origin of the API, including the `/api` prefix.
  pub base_url:             String,
  pub store_path:           PathBuf,
  pub query_timeout_secs:   u64,
  pub gateway_timeout_secs: u64,
  pub allow_payment_bypass: bool,
  pub currency:             String,
  pub default_amount:       i64,
  pub webhook_secret:       String,
  /// Where exports go when no object storage is configured.
  pub export_dir:           PathBuf,
  pub stripe:               Option<StripeConfig>,
  pub resend:               Option<ResendConfig>,
  pub azure:                Option<AzureConfig>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                 "127.0.0.1".into(),
      port:                 8080,
      base_url:             "http://localhost:8080/api".into(),
      store_path:           PathBuf::from("caucus.db"),
      query_timeout_secs:   10,
      gateway_timeout_secs: 15,
      allow_payment_bypass: false,
      currency:             "cad".into(),
      default_amount:       4900,
      webhook_secret:       String::new(),
      export_dir:           PathBuf::from("exports"),
      stripe:               None,
      resend:               None,
      azure:                None,
    }
  }
}

#[derive(Deserialize, Clone)]
pub struct StripeConfig {
  pub secret_key: String,
  #[serde(default = "StripeConfig::default_api_base")]
  pub api_base:   String,
}

impl StripeConfig {
  fn default_api_base() -> String { "https://api.stripe.com".into() }
}

#[derive(Deserialize, Clone)]
pub struct ResendConfig {
  pub api_key:  String,
  #[serde(default = "ResendConfig::default_from")]
  pub from:     String,
  #[serde(default = "ResendConfig::default_api_base")]
  pub api_base: String,
}

impl ResendConfig {
  fn default_from() -> String {
    "Queen Street Analytics <orders@queenstreetanalytics.com>".into()
  }

  fn default_api_base() -> String { "https://api.resend.com".into() }
}

#[derive(Deserialize, Clone)]
pub struct AzureConfig {
  pub account:        String,
  pub container:      String,
  /// SAS token with write permission, with or without the leading `?`.
  pub sas_token:      String,
  /// SAS token embedded in download links; the write token when absent.
  #[serde(default)]
  pub read_sas_token: Option<String>,
  /// Overrides `https://{account}.blob.core.windows.net`.
  #[serde(default)]
  pub endpoint:       Option<String>,
}

impl AzureConfig {
  pub fn container_url(&self) -> String {
    let endpoint = self
      .endpoint
      .clone()
      .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", self.account));
    format!("{}/{}", endpoint.trim_end_matches('/'), self.container)
  }
}

impl ServerConfig {
  /// Layer `path` (optional) under environment variables such as
  /// `CAUCUS__STRIPE__SECRET_KEY`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CAUCUS").separator("__"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn query_timeout(&self) -> Duration { Duration::from_secs(self.query_timeout_secs) }

  pub fn gateway_timeout(&self) -> Duration { Duration::from_secs(self.gateway_timeout_secs) }

  pub fn market_config(&self) -> MarketConfig {
    MarketConfig {
      base_url:          self.base_url.clone(),
      webhook_secret:    self.webhook_secret.clone(),
      webhook_tolerance: webhook::DEFAULT_TOLERANCE,
      machine:           MachineConfig {
        currency:             self.currency.clone(),
        default_amount:       self.default_amount,
        gateway_timeout:      self.gateway_timeout(),
        allow_payment_bypass: self.allow_payment_bypass,
      },
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
