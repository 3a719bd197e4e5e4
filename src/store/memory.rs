//! In-memory license store.
//!
//! Applies the same top-level merge semantics as the HTTP adapter so the
//! service layer behaves identically against either backend. Wired when
//! no store URL is configured; also what the service tests run against.

use async_trait::async_trait;
use uuid::Uuid;

use super::{LicensePatch, LicenseStore};
use crate::{
  model::{AuditEntry, License},
  prelude::*,
};

#[derive(Default)]
pub struct MemoryStore {
  docs: DashMap<String, json::Value>,
  audit: DashMap<Uuid, AuditEntry>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seeds a license document, overwriting any existing one.
  pub fn insert(&self, license: License) {
    let key = license.key.clone();
    let doc = json::to_value(&license).expect("License serializes");
    self.docs.insert(key, doc);
  }

  pub fn audit_entries(&self) -> Vec<AuditEntry> {
    self.audit.iter().map(|entry| entry.value().clone()).collect()
  }
}

/// Top-level merge: `null` deletes a field, anything else overwrites it.
fn merge(doc: &mut json::Value, patch: json::Value) {
  let (Some(doc), json::Value::Object(patch)) = (doc.as_object_mut(), patch)
  else {
    return;
  };

  for (key, value) in patch {
    if value.is_null() {
      doc.remove(&key);
    } else {
      doc.insert(key, value);
    }
  }
}

#[async_trait]
impl LicenseStore for MemoryStore {
  async fn get(&self, key: &str) -> Result<Option<License>> {
    let Some(doc) = self.docs.get(key) else {
      return Ok(None);
    };

    let mut license: License = json::from_value(doc.value().clone())
      .map_err(|err| Error::Internal(format!("Malformed license document: {err}")))?;
    license.key = key.to_string();
    Ok(Some(license))
  }

  async fn update(&self, key: &str, patch: LicensePatch) -> Result<()> {
    let patch = json::to_value(&patch)
      .map_err(|err| Error::Internal(format!("Unserializable patch: {err}")))?;

    let mut doc = self.docs.entry(key.to_string()).or_insert(json::json!({}));
    merge(doc.value_mut(), patch);
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<()> {
    self.docs.remove(key);
    Ok(())
  }

  async fn list(&self) -> Result<HashMap<String, License>> {
    self
      .docs
      .iter()
      .map(|entry| {
        let mut license: License = json::from_value(entry.value().clone())
          .map_err(|err| {
            Error::Internal(format!("Malformed license document: {err}"))
          })?;
        license.key = entry.key().clone();
        Ok((entry.key().clone(), license))
      })
      .collect()
  }

  async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
    self.audit.insert(Uuid::new_v4(), entry.clone());
    Ok(())
  }
}
