//! License validation and activation.
//!
//! A license is permanently bound to the first device fingerprint that
//! activates it. Live usage is additionally limited to one device at a
//! time by the heartbeat lock. Once bound, only the bound device passes
//! the fingerprint check, so the heartbeat lock only matters
//! pre-binding.

use crate::{
  config::Config,
  model,
  prelude::*,
  store::{LicensePatch, LicenseStore, Patch},
};

pub struct License<'a> {
  store: &'a dyn LicenseStore,
  config: &'a Config,
}

impl<'a> License<'a> {
  pub fn new(store: &'a dyn LicenseStore, config: &'a Config) -> Self {
    Self { store, config }
  }

  /// Validates a `(key, fingerprint)` pair and activates the license on
  /// first contact. Checks run in a fixed order, each one terminal:
  ///
  /// 1. unknown key
  /// 2. administratively deactivated
  /// 3. expired (lifetime licenses skip this)
  /// 4. usage ceiling reached (gates fresh activations; the bound
  ///    device keeps validating)
  /// 5. bound to a different device (permanent)
  /// 6. live session held by a different device (clears once the
  ///    holder stops pinging)
  ///
  /// On success the heartbeat is refreshed; an unbound license is bound
  /// to the requesting fingerprint in the same write. The store offers
  /// no conditional update, so two concurrent first activations can
  /// race; last write wins (documented store limitation).
  pub async fn validate(
    &self,
    key: &str,
    fingerprint: &str,
  ) -> Result<model::License> {
    let now = Utc::now();

    let license =
      self.store.get(key).await?.ok_or(Error::LicenseNotFound)?;

    if !license.active {
      return Err(Error::LicenseInactive);
    }

    if license.is_expired(now) {
      return Err(Error::LicenseExpired);
    }

    if let Some(max_uses) = license.max_uses
      && license.uses >= max_uses
      && license.activated_device_fingerprint.is_none()
    {
      return Err(Error::UsageExceeded);
    }

    if license.bound_elsewhere(fingerprint) {
      return Err(Error::DeviceConflict);
    }

    if license.session_held_elsewhere(fingerprint, now, self.config.heartbeat_timeout)
    {
      return Err(Error::SessionBusy);
    }

    match &license.activated_device_fingerprint {
      Some(_) => self.revalidate(license, fingerprint, now).await,
      None => self.activate(license, fingerprint, now).await,
    }
  }

  /// Heartbeat refresh; every authenticated call lands here.
  pub async fn touch(&self, key: &str, fingerprint: &str) -> Result<()> {
    self.store.update(key, LicensePatch::ping(fingerprint, Utc::now())).await
  }

  /// Already bound to this device: refresh the heartbeat, no counter
  /// increment.
  async fn revalidate(
    &self,
    mut license: model::License,
    fingerprint: &str,
    now: DateTime<Utc>,
  ) -> Result<model::License> {
    let ping = LicensePatch::ping(fingerprint, now);
    self.store.update(&license.key, ping).await?;

    license.active_session = Some(model::ActiveSession {
      device_fingerprint: fingerprint.to_string(),
      last_ping_at: now,
    });
    Ok(license)
  }

  /// First activation: bind the device, bump the usage counter and
  /// stamp the activation date in one merge write.
  async fn activate(
    &self,
    mut license: model::License,
    fingerprint: &str,
    now: DateTime<Utc>,
  ) -> Result<model::License> {
    let patch = LicensePatch {
      uses: Patch::Set(license.uses + 1),
      activated_device_fingerprint: Patch::Set(fingerprint.to_string()),
      activated_date: Patch::Set(now),
      ..LicensePatch::ping(fingerprint, now)
    };
    self.store.update(&license.key, patch).await?;

    info!("License {} activated by device {}", license.key, fingerprint);

    license.uses += 1;
    license.activated_device_fingerprint = Some(fingerprint.to_string());
    license.activated_date = Some(now);
    license.active_session = Some(model::ActiveSession {
      device_fingerprint: fingerprint.to_string(),
      last_ping_at: now,
    });
    Ok(license)
  }
}
