//! Process-wide configuration, loaded once at startup.
//!
//! The signing secret and protocol version are read-only for the life of
//! the process. Rotation procedure: restart with a new `PROTOCOL_VERSION`
//! (or a new `SERVER_SECRET`) to invalidate every outstanding token in
//! one step; request handlers never mutate either value.

use std::env;

use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Config {
  /// HMAC secret for session/refresh token signing.
  pub secret: String,
  /// Global protocol version embedded in every token. Tokens minted
  /// under any other version are rejected.
  pub protocol_version: u32,

  /// Base URL of the external license document store. Unset means the
  /// in-memory store is used instead.
  pub store_url: Option<String>,
  /// Optional auth secret appended to store requests.
  pub store_auth: Option<String>,
  /// Bounded timeout for store round trips (fail closed past it).
  pub store_timeout: Duration,

  pub session_ttl: Duration,
  pub refresh_ttl: Duration,
  /// A session holder that stops pinging for longer than this loses the
  /// soft lock.
  pub heartbeat_timeout: Duration,

  pub port: u16,
  /// Operator credential -> operator name, for admin endpoints.
  pub admins: HashMap<String, String>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      secret: String::new(),
      protocol_version: 1,

      store_url: None,
      store_auth: None,
      store_timeout: Duration::from_secs(5),

      session_ttl: Duration::from_hours(12),
      refresh_ttl: Duration::from_hours(24 * 30),
      heartbeat_timeout: Duration::from_secs(15 * 60),

      port: 3000,
      admins: HashMap::new(),
    }
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let defaults = Self::default();

    let secret = env::var("SERVER_SECRET").context("SERVER_SECRET not set")?;

    let protocol_version = match env::var("PROTOCOL_VERSION") {
      Ok(raw) => raw.trim().parse().context("Invalid PROTOCOL_VERSION")?,
      Err(_) => defaults.protocol_version,
    };

    let admins = match env::var("ADMIN_TOKENS") {
      Ok(raw) => parse_admins(&raw)?,
      Err(_) => HashMap::new(),
    };

    if admins.is_empty() {
      warn!("No admins configured, revocation endpoint disabled");
    }

    Ok(Self {
      secret,
      protocol_version,

      store_url: env::var("STORE_URL").ok(),
      store_auth: env::var("STORE_AUTH").ok(),
      store_timeout: duration_var("STORE_TIMEOUT", defaults.store_timeout)?,

      session_ttl: duration_var("SESSION_TTL", defaults.session_ttl)?,
      refresh_ttl: duration_var("REFRESH_TTL", defaults.refresh_ttl)?,
      heartbeat_timeout: duration_var(
        "HEARTBEAT_TIMEOUT",
        defaults.heartbeat_timeout,
      )?,

      port: match env::var("PORT") {
        Ok(raw) => raw.trim().parse().context("Invalid PORT")?,
        Err(_) => defaults.port,
      },
      admins,
    })
  }
}

/// Parses `name:token` pairs separated by commas into token -> name.
fn parse_admins(raw: &str) -> anyhow::Result<HashMap<String, String>> {
  raw
    .split(',')
    .filter(|pair| !pair.trim().is_empty())
    .map(|pair| {
      let (name, token) = pair
        .trim()
        .split_once(':')
        .context("ADMIN_TOKENS entries must be `name:token`")?;
      Ok((token.to_string(), name.to_string()))
    })
    .collect()
}

fn duration_var(name: &str, default: Duration) -> anyhow::Result<Duration> {
  match env::var(name) {
    Ok(raw) => humantime::parse_duration(raw.trim())
      .with_context(|| format!("Invalid {name}")),
    Err(_) => Ok(default),
  }
}
