//! Error types for the license server

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("Authorization token missing")]
  AuthMissing,

  #[error("Invalid session token")]
  AuthInvalid,

  #[error("Token expired")]
  AuthExpired,

  /// Protocol version embedded in the token does not match the current
  /// one. Surfaces with the same public message as [`Error::AuthInvalid`]
  /// so clients cannot probe for version rotations.
  #[error("Stale protocol version")]
  ProtocolStale,

  #[error("License not found")]
  LicenseNotFound,

  #[error("License is deactivated")]
  LicenseInactive,

  #[error("License expired")]
  LicenseExpired,

  #[error("License is bound to another device")]
  DeviceConflict,

  #[error("License is in use on another device")]
  SessionBusy,

  #[error("Usage limit reached")]
  UsageExceeded,

  #[error("License store unavailable: {0}")]
  StoreUnavailable(#[from] reqwest::Error),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::AuthMissing | Self::AuthInvalid | Self::AuthExpired | Self::ProtocolStale => {
        StatusCode::UNAUTHORIZED
      }
      Self::LicenseNotFound => StatusCode::NOT_FOUND,
      Self::LicenseInactive | Self::LicenseExpired | Self::DeviceConflict | Self::UsageExceeded => {
        StatusCode::FORBIDDEN
      }
      Self::SessionBusy => StatusCode::CONFLICT,
      Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Message shown to the caller. Never includes store or signature
  /// details, and `ProtocolStale` is indistinguishable from a bad token.
  pub fn message(&self) -> &'static str {
    match self {
      Self::AuthMissing => "Authorization token missing",
      Self::AuthInvalid | Self::ProtocolStale => "Invalid session token",
      // kind-neutral: the refresh path reports expiry with this too
      Self::AuthExpired => "Token expired",
      Self::LicenseNotFound => "License not found",
      Self::LicenseInactive => "License is deactivated",
      Self::LicenseExpired => "License expired",
      Self::DeviceConflict => "License is bound to another device",
      Self::SessionBusy => "License is in use on another device",
      Self::UsageExceeded => "Usage limit reached",
      Self::StoreUnavailable(_) => "Service temporarily unavailable",
      Self::Internal(_) => "Internal error",
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let body = json::json!({
      "valid": false,
      "message": self.message(),
    });

    (self.status(), Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
