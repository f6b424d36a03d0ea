//! Resend-compatible email client.

use caucus_core::{
  Error, Result,
  ports::{Email, Mailer},
};
use reqwest::Client;
use serde::Serialize;

use crate::settings::ResendConfig;

const SERVICE: &str = "email";

pub struct ResendMailer {
  client:   Client,
  api_base: String,
  api_key:  String,
  from:     String,
}

#[derive(Debug, Serialize)]
struct Outgoing<'a> {
  from:    &'a str,
  to:      [&'a str; 1],
  subject: &'a str,
  html:    &'a str,
  text:    &'a str,
}

impl ResendMailer {
  pub fn new(client: Client, config: &ResendConfig) -> anyhow::Result<Self> {
    anyhow::ensure!(!config.api_key.trim().is_empty(), "resend.api_key is empty");
    Ok(Self {
      client,
      api_base: config.api_base.trim_end_matches('/').to_owned(),
      api_key: config.api_key.clone(),
      from: config.from.clone(),
    })
  }

  fn outgoing<'a>(&'a self, email: &'a Email) -> Outgoing<'a> {
    Outgoing {
      from:    &self.from,
      to:      [&email.to],
      subject: &email.subject,
      html:    &email.html,
      text:    &email.text,
    }
  }
}

impl Mailer for ResendMailer {
  async fn send<'a>(&'a self, email: &'a Email) -> Result<()> {
    let resp = self
      .client
      .post(format!("{}/emails", self.api_base))
      .bearer_auth(&self.api_key)
      .json(&self.outgoing(email))
      .send()
      .await
      .map_err(|e| Error::upstream(SERVICE, e))?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::upstream(SERVICE, format!("POST /emails → {status}: {body}")));
    }
    Ok(())
  }
}
