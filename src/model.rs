//! License documents as they live in the external store.
//!
//! Field names stay camelCase on the wire; the store is a plain JSON
//! document tree and other tooling reads the same documents.

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Soft lock describing which device currently owns live usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
  pub device_fingerprint: String,
  pub last_ping_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
  /// Opaque client-presented credential; doubles as the document key.
  #[serde(default)]
  pub key: String,

  /// Administrative kill switch, independent of expiry.
  #[serde(default = "default_true")]
  pub active: bool,

  /// Lifetime licenses ignore `expiryDate` entirely.
  #[serde(default)]
  pub lifetime: bool,

  /// RFC 3339 timestamp. Missing or unparsable on a non-lifetime
  /// license counts as expired.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expiry_date: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_uses: Option<u32>,

  #[serde(default)]
  pub uses: u32,

  /// Set on first activation; only an administrative reset changes it.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub activated_device_fingerprint: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub activated_date: Option<DateTime<Utc>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub active_session: Option<ActiveSession>,
}

fn default_true() -> bool {
  true
}

impl License {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    if self.lifetime {
      return false;
    }

    match self.expiry_date.as_deref().map(DateTime::parse_from_rfc3339) {
      Some(Ok(expiry)) => expiry.with_timezone(&Utc) <= now,
      // missing or garbage expiry on a non-lifetime license fails closed
      _ => true,
    }
  }

  /// Whether a *different* device holds a live heartbeat on this license.
  pub fn session_held_elsewhere(
    &self,
    fingerprint: &str,
    now: DateTime<Utc>,
    timeout: Duration,
  ) -> bool {
    match &self.active_session {
      Some(session) if session.device_fingerprint != fingerprint => {
        (now - session.last_ping_at).num_seconds() < timeout.as_secs() as i64
      }
      _ => false,
    }
  }

  pub fn bound_elsewhere(&self, fingerprint: &str) -> bool {
    match &self.activated_device_fingerprint {
      Some(bound) => bound != fingerprint,
      None => false,
    }
  }
}

/// Record written to the store's `audit/` branch on mass revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
  pub operator: String,
  pub action: String,
  pub timestamp: DateTime<Utc>,
  pub affected: u32,
}
