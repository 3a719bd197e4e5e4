//! Session/refresh token codec.
//!
//! Tokens are stateless HMAC-signed credentials; validity is
//! reconstructed entirely from the signed claims plus the configured
//! protocol version. Verification is pure: no I/O, one comparison
//! against the live protocol version.

use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::Config, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
  Session,
  Refresh,
}

/// Signed claims. Short keys keep the compact encoding small:
/// `lk` license key, `df` device fingerprint, `un` display name,
/// `pv` protocol version, `sid` session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub lk: String,
  pub df: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub un: Option<String>,
  pub pv: u32,
  pub sid: Uuid,
  #[serde(rename = "type")]
  pub kind: TokenKind,
  pub iat: i64,
  pub exp: i64,
}

/// A freshly minted credential pair. The session and refresh tokens
/// share one `session_id` so they can be correlated later.
#[derive(Debug, Clone)]
pub struct SessionGrant {
  pub session_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
  pub session_id: Uuid,
}

#[derive(Clone)]
pub struct TokenCodec {
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
  validation: Validation,
  protocol_version: u32,
  session_ttl: Duration,
  refresh_ttl: Duration,
}

impl TokenCodec {
  pub fn new(config: &Config) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 5; // clock skew

    Self {
      encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
      decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
      validation,
      protocol_version: config.protocol_version,
      session_ttl: config.session_ttl,
      refresh_ttl: config.refresh_ttl,
    }
  }

  /// Mints a session + refresh pair bound to one license and device.
  pub fn create_session(
    &self,
    license_key: &str,
    fingerprint: &str,
    display_name: Option<&str>,
  ) -> Result<SessionGrant> {
    let now = Utc::now();
    let session_id = Uuid::new_v4();
    let expires_at = now + self.session_ttl;
    let refresh_expires_at = now + self.refresh_ttl;

    let session = Claims {
      lk: license_key.to_string(),
      df: fingerprint.to_string(),
      un: display_name.map(str::to_string),
      pv: self.protocol_version,
      sid: session_id,
      kind: TokenKind::Session,
      iat: now.timestamp(),
      exp: expires_at.timestamp(),
    };

    let refresh = Claims {
      un: None,
      kind: TokenKind::Refresh,
      exp: refresh_expires_at.timestamp(),
      ..session.clone()
    };

    Ok(SessionGrant {
      session_token: self.sign(&session)?,
      refresh_token: self.sign(&refresh)?,
      expires_at,
      session_id,
    })
  }

  pub fn verify_session(&self, token: &str) -> Result<Claims> {
    self.verify(token, TokenKind::Session)
  }

  pub fn verify_refresh(&self, token: &str) -> Result<Claims> {
    self.verify(token, TokenKind::Refresh)
  }

  fn sign(&self, claims: &Claims) -> Result<String> {
    encode(&Header::default(), claims, &self.encoding_key)
      .map_err(|err| Error::Internal(format!("Failed to sign token: {err}")))
  }

  fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims> {
    let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
      .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::AuthExpired,
        _ => {
          debug!("Token rejected: {err}");
          Error::AuthInvalid
        }
      })?;

    let claims = data.claims;

    if claims.kind != kind {
      debug!("Token rejected: wrong kind {:?}", claims.kind);
      return Err(Error::AuthInvalid);
    }

    if claims.pv != self.protocol_version {
      debug!("Token rejected: protocol version {} != {}", claims.pv, self.protocol_version);
      return Err(Error::ProtocolStale);
    }

    Ok(claims)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn codec(protocol_version: u32) -> TokenCodec {
    TokenCodec::new(&Config {
      secret: "unit-test-secret".into(),
      protocol_version,
      ..Config::default()
    })
  }

  #[test]
  fn round_trips_a_session_token() {
    let codec = codec(1);
    let grant = codec.create_session("L-1", "dev-a", Some("Alice")).unwrap();

    let claims = codec.verify_session(&grant.session_token).unwrap();

    assert_eq!(claims.lk, "L-1");
    assert_eq!(claims.df, "dev-a");
    assert_eq!(claims.un.as_deref(), Some("Alice"));
    assert_eq!(claims.sid, grant.session_id);
    assert_eq!(claims.exp, grant.expires_at.timestamp());
  }

  #[test]
  fn refresh_token_shares_the_session_id() {
    let codec = codec(1);
    let grant = codec.create_session("L-1", "dev-a", None).unwrap();

    let claims = codec.verify_refresh(&grant.refresh_token).unwrap();

    assert_eq!(claims.sid, grant.session_id);
    assert_eq!(claims.un, None);
  }

  #[test]
  fn rejects_tokens_of_the_wrong_kind() {
    let codec = codec(1);
    let grant = codec.create_session("L-1", "dev-a", None).unwrap();

    assert!(matches!(
      codec.verify_session(&grant.refresh_token),
      Err(Error::AuthInvalid)
    ));
    assert!(matches!(
      codec.verify_refresh(&grant.session_token),
      Err(Error::AuthInvalid)
    ));
  }

  #[test]
  fn rejects_tampered_tokens() {
    let codec = codec(1);
    let grant = codec.create_session("L-1", "dev-a", None).unwrap();

    let mut token = grant.session_token;
    let flipped = if token.ends_with('A') { 'B' } else { 'A' };
    token.pop();
    token.push(flipped);

    assert!(matches!(codec.verify_session(&token), Err(Error::AuthInvalid)));
  }

  #[test]
  fn protocol_bump_kills_outstanding_tokens() {
    let grant = codec(1).create_session("L-1", "dev-a", None).unwrap();

    // Same secret, bumped version: the untouched token now rejects.
    assert!(matches!(
      codec(2).verify_session(&grant.session_token),
      Err(Error::ProtocolStale)
    ));
  }

  #[test]
  fn rejects_expired_tokens() {
    let codec = codec(1);
    let now = Utc::now();

    let claims = Claims {
      lk: "L-1".into(),
      df: "dev-a".into(),
      un: None,
      pv: 1,
      sid: Uuid::new_v4(),
      kind: TokenKind::Session,
      iat: (now - chrono::Duration::hours(2)).timestamp(),
      exp: (now - chrono::Duration::hours(1)).timestamp(),
    };
    let token = codec.sign(&claims).unwrap();

    assert!(matches!(codec.verify_session(&token), Err(Error::AuthExpired)));

    // an expired refresh token reports expiry the same way
    let refresh = Claims { kind: TokenKind::Refresh, ..claims };
    let token = codec.sign(&refresh).unwrap();

    assert!(matches!(codec.verify_refresh(&token), Err(Error::AuthExpired)));
  }

  #[test]
  fn rejects_tokens_signed_with_another_secret() {
    let other = TokenCodec::new(&Config {
      secret: "different-secret".into(),
      ..Config::default()
    });
    let grant = other.create_session("L-1", "dev-a", None).unwrap();

    assert!(matches!(
      codec(1).verify_session(&grant.session_token),
      Err(Error::AuthInvalid)
    ));
  }
}
