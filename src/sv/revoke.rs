//! Mass revocation.
//!
//! Clearing bindings and sessions in the store forces every device back
//! through activation. Tokens already in the wild are stateless and
//! unaffected; killing them means rotating `PROTOCOL_VERSION` (or the
//! signing secret) and restarting, see [`crate::config`].

use futures::future::try_join_all;

use crate::{
  model::AuditEntry,
  prelude::*,
  store::{LicensePatch, LicenseStore},
};

pub struct Revoke<'a> {
  store: &'a dyn LicenseStore,
}

impl<'a> Revoke<'a> {
  pub fn new(store: &'a dyn LicenseStore) -> Self {
    Self { store }
  }

  /// Unbinds every license that has a device binding or a live session
  /// and writes an audit record. Returns the number of licenses touched.
  /// Not transactional: a failure mid-way leaves earlier clears in place.
  pub async fn revoke_all(&self, operator: &str) -> Result<u32> {
    let licenses = self.store.list().await?;

    let targets: Vec<String> = licenses
      .into_iter()
      .filter(|(_, license)| {
        license.activated_device_fingerprint.is_some()
          || license.active_session.is_some()
      })
      .map(|(key, _)| key)
      .collect();

    try_join_all(
      targets.iter().map(|key| self.store.update(key, LicensePatch::unbind())),
    )
    .await?;

    let affected = targets.len() as u32;
    self
      .store
      .append_audit(&AuditEntry {
        operator: operator.to_string(),
        action: "revokeAllSessions".to_string(),
        timestamp: Utc::now(),
        affected,
      })
      .await?;

    info!("Operator {operator} revoked all sessions ({affected} licenses)");
    Ok(affected)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::{ActiveSession, License},
    store::MemoryStore,
  };

  fn license(key: &str) -> License {
    json::from_value(json::json!({ "key": key, "lifetime": true })).unwrap()
  }

  #[tokio::test]
  async fn clears_bindings_sessions_and_writes_an_audit_entry() {
    let store = MemoryStore::new();

    let mut bound = license("L-1");
    bound.activated_device_fingerprint = Some("dev-a".into());
    bound.activated_date = Some(Utc::now());
    bound.uses = 1;
    bound.active_session = Some(ActiveSession {
      device_fingerprint: "dev-a".into(),
      last_ping_at: Utc::now(),
    });
    store.insert(bound);

    store.insert(license("L-2")); // untouched, nothing to clear

    let affected = Revoke::new(&store).revoke_all("alice").await.unwrap();
    assert_eq!(affected, 1);

    let cleared = store.get("L-1").await.unwrap().unwrap();
    assert!(cleared.activated_device_fingerprint.is_none());
    assert!(cleared.activated_date.is_none());
    assert!(cleared.active_session.is_none());
    // the usage counter is history, not session state
    assert_eq!(cleared.uses, 1);

    let audit = store.audit_entries();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].operator, "alice");
    assert_eq!(audit[0].affected, 1);
  }

  #[tokio::test]
  async fn devices_reactivate_after_revocation() {
    let store = MemoryStore::new();
    let config = crate::config::Config {
      secret: "test".into(),
      ..crate::config::Config::default()
    };

    let mut bound = license("L-1");
    bound.activated_device_fingerprint = Some("dev-a".into());
    bound.uses = 1;
    store.insert(bound);

    Revoke::new(&store).revoke_all("alice").await.unwrap();

    // the license is unbound again; any device may claim it
    let validated = crate::sv::License::new(&store, &config)
      .validate("L-1", "dev-b")
      .await
      .unwrap();
    assert_eq!(
      validated.activated_device_fingerprint.as_deref(),
      Some("dev-b")
    );
  }
}
