//! HTTP document store adapter.
//!
//! Speaks the usual JSON-tree REST shape: `GET /licenses/{key}.json`
//! returns the document or `null`, `PATCH` merge-writes, `DELETE`
//! removes. Every request carries a bounded timeout; a store that does
//! not answer surfaces as [`Error::StoreUnavailable`], never as a valid
//! license (fail closed).

use async_trait::async_trait;
use uuid::Uuid;

use super::{LicensePatch, LicenseStore};
use crate::{
  model::{AuditEntry, License},
  prelude::*,
};

pub struct HttpStore {
  client: reqwest::Client,
  base_url: String,
  auth: Option<String>,
}

impl HttpStore {
  pub fn new(base_url: &str, auth: Option<String>, timeout: Duration) -> Self {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .expect("Failed to build store HTTP client");

    Self { client, base_url: base_url.trim_end_matches('/').to_string(), auth }
  }

  fn url(&self, path: &str) -> String {
    match &self.auth {
      Some(auth) => format!("{}/{path}.json?auth={auth}", self.base_url),
      None => format!("{}/{path}.json", self.base_url),
    }
  }
}

#[async_trait]
impl LicenseStore for HttpStore {
  async fn get(&self, key: &str) -> Result<Option<License>> {
    let value: json::Value = self
      .client
      .get(self.url(&format!("licenses/{key}")))
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    if value.is_null() {
      return Ok(None);
    }

    let mut license: License = json::from_value(value)
      .map_err(|err| Error::Internal(format!("Malformed license document: {err}")))?;
    license.key = key.to_string();
    Ok(Some(license))
  }

  async fn update(&self, key: &str, patch: LicensePatch) -> Result<()> {
    self
      .client
      .patch(self.url(&format!("licenses/{key}")))
      .json(&patch)
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<()> {
    self
      .client
      .delete(self.url(&format!("licenses/{key}")))
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }

  async fn list(&self) -> Result<HashMap<String, License>> {
    let value: json::Value = self
      .client
      .get(self.url("licenses"))
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    if value.is_null() {
      return Ok(HashMap::new());
    }

    let mut licenses: HashMap<String, License> = json::from_value(value)
      .map_err(|err| Error::Internal(format!("Malformed license tree: {err}")))?;
    for (key, license) in licenses.iter_mut() {
      license.key = key.clone();
    }
    Ok(licenses)
  }

  async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
    self
      .client
      .put(self.url(&format!("audit/{}", Uuid::new_v4())))
      .json(entry)
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }
}
