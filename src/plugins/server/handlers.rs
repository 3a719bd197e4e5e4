use std::sync::Arc;

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode, header::AUTHORIZATION},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{model, prelude::*, state::AppState, token::Claims};

fn bearer(headers: &HeaderMap) -> Result<&str> {
  headers
    .get(AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "))
    .filter(|token| !token.is_empty())
    .ok_or(Error::AuthMissing)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateReq {
  pub license_key: String,
  pub device_fingerprint: String,
  #[serde(default)]
  pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRes {
  pub valid: bool,
  pub session_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
  pub license: model::License,
}

pub async fn validate_license(
  State(app): State<Arc<AppState>>,
  Json(req): Json<ValidateReq>,
) -> Result<Json<ValidateRes>> {
  let (grant, license) = app
    .sv()
    .session
    .open(
      &req.license_key,
      &req.device_fingerprint,
      req.display_name.as_deref(),
    )
    .await?;

  Ok(Json(ValidateRes {
    valid: true,
    session_token: grant.session_token,
    refresh_token: grant.refresh_token,
    expires_at: grant.expires_at,
    license,
  }))
}

/// Claims subset exposed to callers; signature internals stay private.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
  pub license_key: String,
  pub device_fingerprint: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  pub session_id: Uuid,
  pub expires_at: DateTime<Utc>,
}

impl From<Claims> for SessionInfo {
  fn from(claims: Claims) -> Self {
    Self {
      license_key: claims.lk,
      device_fingerprint: claims.df,
      display_name: claims.un,
      session_id: claims.sid,
      expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_default(),
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRes {
  pub valid: bool,
  pub session: SessionInfo,
  pub license: model::License,
}

pub async fn verify_session(
  State(app): State<Arc<AppState>>,
  headers: HeaderMap,
) -> Result<Json<VerifyRes>> {
  let token = bearer(&headers)?;
  let (claims, license) = app.sv().session.verify(token).await?;

  Ok(Json(VerifyRes { valid: true, session: claims.into(), license }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReq {
  pub refresh_token: String,
  #[serde(default)]
  pub device_fingerprint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRes {
  pub valid: bool,
  pub session_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
}

pub async fn refresh_session(
  State(app): State<Arc<AppState>>,
  Json(req): Json<RefreshReq>,
) -> Result<Json<RefreshRes>> {
  let grant = app
    .sv()
    .session
    .refresh(&req.refresh_token, req.device_fingerprint.as_deref())
    .await?;

  Ok(Json(RefreshRes {
    valid: true,
    session_token: grant.session_token,
    refresh_token: grant.refresh_token,
    expires_at: grant.expires_at,
  }))
}

#[derive(Debug, Serialize)]
pub struct RevokeRes {
  pub success: bool,
  pub message: String,
}

/// Requires an operator credential from the allow-list; session tokens
/// are deliberately not accepted here.
pub async fn revoke_all_sessions(
  State(app): State<Arc<AppState>>,
  headers: HeaderMap,
) -> (StatusCode, Json<RevokeRes>) {
  let operator = match bearer(&headers)
    .ok()
    .and_then(|token| app.config.admins.get(token))
  {
    Some(operator) => operator.clone(),
    None => {
      return (
        StatusCode::UNAUTHORIZED,
        Json(RevokeRes {
          success: false,
          message: "Administrator credential required".into(),
        }),
      );
    }
  };

  match app.sv().revoke.revoke_all(&operator).await {
    Ok(affected) => (
      StatusCode::OK,
      Json(RevokeRes {
        success: true,
        message: format!("Revoked sessions on {affected} licenses"),
      }),
    ),
    Err(err) => (
      err.status(),
      Json(RevokeRes { success: false, message: err.message().into() }),
    ),
  }
}

pub async fn health() -> &'static str {
  "OK"
}

#[cfg(test)]
mod tests {
  use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
  };
  use tower::ServiceExt;

  use super::*;
  use crate::{
    config::Config,
    store::{LicenseStore, MemoryStore},
  };

  fn test_app() -> (Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.insert(
      json::from_value(json::json!({ "key": "L-1", "lifetime": true }))
        .unwrap(),
    );

    let config = Config {
      secret: "handler-test-secret".into(),
      admins: HashMap::from([("op-token".to_string(), "alice".to_string())]),
      ..Config::default()
    };

    (Arc::new(AppState::with_store(config, store.clone())), store)
  }

  fn router(app: Arc<AppState>) -> Router {
    crate::plugins::server::router(app)
  }

  async fn post_json(
    router: &Router,
    uri: &str,
    body: json::Value,
  ) -> (StatusCode, json::Value) {
    let response = router
      .clone()
      .oneshot(
        Request::post(uri)
          .header(header::CONTENT_TYPE, "application/json")
          .body(Body::from(body.to_string()))
          .unwrap(),
      )
      .await
      .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, json::from_slice(&bytes).unwrap())
  }

  async fn post_bearer(
    router: &Router,
    uri: &str,
    token: &str,
  ) -> (StatusCode, json::Value) {
    let response = router
      .clone()
      .oneshot(
        Request::post(uri)
          .header(header::AUTHORIZATION, format!("Bearer {token}"))
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, json::from_slice(&bytes).unwrap())
  }

  #[tokio::test]
  async fn validate_issues_tokens_and_binds() {
    let (app, _) = test_app();
    let router = router(app);

    let (status, body) = post_json(
      &router,
      "/validateLicense",
      json::json!({ "licenseKey": "L-1", "deviceFingerprint": "dev-a" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json::json!(true));
    assert!(body["sessionToken"].is_string());
    assert!(body["refreshToken"].is_string());
    assert_eq!(
      body["license"]["activatedDeviceFingerprint"],
      json::json!("dev-a")
    );
  }

  #[tokio::test]
  async fn validate_rejects_a_second_device() {
    let (app, _) = test_app();
    let router = router(app);

    post_json(
      &router,
      "/validateLicense",
      json::json!({ "licenseKey": "L-1", "deviceFingerprint": "dev-a" }),
    )
    .await;

    let (status, body) = post_json(
      &router,
      "/validateLicense",
      json::json!({ "licenseKey": "L-1", "deviceFingerprint": "dev-b" }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["valid"], json::json!(false));
    assert_eq!(body["message"], json::json!("License is bound to another device"));
  }

  #[tokio::test]
  async fn verify_requires_a_bearer_token() {
    let (app, _) = test_app();
    let router = router(app);

    let response = router
      .clone()
      .oneshot(Request::post("/verifySession").body(Body::empty()).unwrap())
      .await
      .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn verify_round_trip() {
    let (app, _) = test_app();
    let router = router(app);

    let (_, body) = post_json(
      &router,
      "/validateLicense",
      json::json!({ "licenseKey": "L-1", "deviceFingerprint": "dev-a" }),
    )
    .await;
    let token = body["sessionToken"].as_str().unwrap();

    let (status, body) = post_bearer(&router, "/verifySession", token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json::json!(true));
    assert_eq!(body["session"]["licenseKey"], json::json!("L-1"));
    assert_eq!(body["session"]["deviceFingerprint"], json::json!("dev-a"));
  }

  #[tokio::test]
  async fn refresh_round_trip() {
    let (app, _) = test_app();
    let router = router(app);

    let (_, body) = post_json(
      &router,
      "/validateLicense",
      json::json!({ "licenseKey": "L-1", "deviceFingerprint": "dev-a" }),
    )
    .await;
    let refresh = body["refreshToken"].as_str().unwrap();

    let (status, body) = post_json(
      &router,
      "/refreshSession",
      json::json!({ "refreshToken": refresh, "deviceFingerprint": "dev-a" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json::json!(true));
    assert!(body["sessionToken"].is_string());
  }

  #[tokio::test]
  async fn revoke_requires_an_operator_credential() {
    let (app, _) = test_app();
    let router = router(app);

    let (status, body) =
      post_bearer(&router, "/revokeAllSessions", "not-an-admin").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json::json!(false));
  }

  #[tokio::test]
  async fn revoke_unbinds_and_audits() {
    let (app, store) = test_app();
    let router = router(app);

    post_json(
      &router,
      "/validateLicense",
      json::json!({ "licenseKey": "L-1", "deviceFingerprint": "dev-a" }),
    )
    .await;

    let (status, body) =
      post_bearer(&router, "/revokeAllSessions", "op-token").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json::json!(true));

    let license = store.get("L-1").await.unwrap().unwrap();
    assert!(license.activated_device_fingerprint.is_none());
    assert_eq!(store.audit_entries().len(), 1);
  }
}
