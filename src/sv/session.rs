//! Session orchestration: open, verify, refresh.

use crate::{
  config::Config,
  model, prelude::*,
  store::LicenseStore,
  sv,
  token::{Claims, SessionGrant, TokenCodec},
};

pub struct Session<'a> {
  store: &'a dyn LicenseStore,
  tokens: &'a TokenCodec,
  config: &'a Config,
}

impl<'a> Session<'a> {
  pub fn new(
    store: &'a dyn LicenseStore,
    tokens: &'a TokenCodec,
    config: &'a Config,
  ) -> Self {
    Self { store, tokens, config }
  }

  fn licenses(&self) -> sv::License<'a> {
    sv::License::new(self.store, self.config)
  }

  /// Full validation + credential minting: the `/validateLicense` path.
  pub async fn open(
    &self,
    license_key: &str,
    fingerprint: &str,
    display_name: Option<&str>,
  ) -> Result<(SessionGrant, model::License)> {
    let license = self.licenses().validate(license_key, fingerprint).await?;
    let grant =
      self.tokens.create_session(license_key, fingerprint, display_name)?;
    Ok((grant, license))
  }

  /// Verifies a session token, re-checks the license it references and
  /// refreshes the heartbeat for the token's device.
  pub async fn verify(&self, token: &str) -> Result<(Claims, model::License)> {
    let claims = self.tokens.verify_session(token)?;

    let license =
      self.store.get(&claims.lk).await?.ok_or(Error::LicenseNotFound)?;

    if !license.active {
      return Err(Error::LicenseInactive);
    }

    if license.is_expired(Utc::now()) {
      return Err(Error::LicenseExpired);
    }

    // The binding may have moved under us (administrative reset plus a
    // re-activation elsewhere); a stale token must not keep working.
    if license.bound_elsewhere(&claims.df) {
      return Err(Error::DeviceConflict);
    }

    self.licenses().touch(&claims.lk, &claims.df).await?;

    Ok((claims, license))
  }

  /// Derives a fresh session + refresh pair from a valid refresh token
  /// without re-presenting the license key. The new pair carries the
  /// *original* license key and fingerprint under a new session id; old
  /// tokens stay valid until their own expiry.
  pub async fn refresh(
    &self,
    refresh_token: &str,
    fingerprint: Option<&str>,
  ) -> Result<SessionGrant> {
    let claims = self.tokens.verify_refresh(refresh_token)?;

    if let Some(supplied) = fingerprint
      && supplied != claims.df
    {
      return Err(Error::DeviceConflict);
    }

    let license =
      self.store.get(&claims.lk).await?.ok_or(Error::LicenseNotFound)?;

    if !license.active {
      return Err(Error::LicenseInactive);
    }

    if license.is_expired(Utc::now()) {
      return Err(Error::LicenseExpired);
    }

    self.tokens.create_session(&claims.lk, &claims.df, claims.un.as_deref())
  }
}
