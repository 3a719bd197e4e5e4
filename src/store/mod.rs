//! License store adapters.
//!
//! The backing store is a JSON document tree with per-key
//! read/merge-write/delete only; there is no compare-and-swap. Every
//! check-then-mutate on top of it is a read-modify-write with a narrow
//! race window (two concurrent first activations can both observe an
//! unbound license). Accepted store limitation.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Serialize, Serializer};

use crate::{
  model::{ActiveSession, AuditEntry, License},
  prelude::*,
};

pub use http::HttpStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait LicenseStore: Send + Sync {
  async fn get(&self, key: &str) -> Result<Option<License>>;

  /// Merge-writes the patch into the document (never a full replace).
  /// Creates the document if it does not exist.
  async fn update(&self, key: &str, patch: LicensePatch) -> Result<()>;

  async fn delete(&self, key: &str) -> Result<()>;

  /// Full license map; only the revocation path walks it.
  async fn list(&self) -> Result<HashMap<String, License>>;

  async fn append_audit(&self, entry: &AuditEntry) -> Result<()>;
}

/// One field of a merge patch: leave untouched, overwrite, or delete.
/// `Clear` serializes as JSON `null`, which the document store treats
/// as field deletion.
#[derive(Debug, Clone, Default)]
pub enum Patch<T> {
  #[default]
  Keep,
  Set(T),
  Clear,
}

impl<T> Patch<T> {
  pub fn is_keep(&self) -> bool {
    matches!(self, Self::Keep)
  }
}

impl<T: Serialize> Serialize for Patch<T> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      // Keep is skipped at the field level; serialize defensively anyway
      Self::Keep | Self::Clear => serializer.serialize_none(),
      Self::Set(value) => value.serialize(serializer),
    }
  }
}

/// Partial update of a license document, covering exactly the fields the
/// core mutates. Untouched fields are omitted from the wire format.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensePatch {
  #[serde(skip_serializing_if = "Patch::is_keep")]
  pub uses: Patch<u32>,

  #[serde(skip_serializing_if = "Patch::is_keep")]
  pub activated_device_fingerprint: Patch<String>,

  #[serde(skip_serializing_if = "Patch::is_keep")]
  pub activated_date: Patch<DateTime<Utc>>,

  #[serde(skip_serializing_if = "Patch::is_keep")]
  pub active_session: Patch<ActiveSession>,
}

impl LicensePatch {
  /// Heartbeat refresh for the given device.
  pub fn ping(fingerprint: &str, now: DateTime<Utc>) -> Self {
    Self {
      active_session: Patch::Set(ActiveSession {
        device_fingerprint: fingerprint.to_string(),
        last_ping_at: now,
      }),
      ..Self::default()
    }
  }

  /// Drops both the device binding and the live session, forcing the
  /// device back through activation.
  pub fn unbind() -> Self {
    Self {
      activated_device_fingerprint: Patch::Clear,
      activated_date: Patch::Clear,
      active_session: Patch::Clear,
      ..Self::default()
    }
  }
}
