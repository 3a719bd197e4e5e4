//! License/session validation server.
//!
//! Architecture:
//! - Axum HTTP API with rate limiting
//! - External JSON document store for license records (reqwest)
//! - Stateless HMAC-signed session/refresh tokens
//! - Tokio runtime, supervised service plugins

mod config;
mod error;
mod model;
mod plugins;
mod prelude;
mod state;
mod store;
mod sv;
mod token;

use std::sync::Arc;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{config::Config, prelude::*, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "licensor=debug,tower_http=debug,axum=trace".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;
  info!("Starting license server v{}", env!("CARGO_PKG_VERSION"));
  info!("Protocol version {}", config.protocol_version);

  let app = Arc::new(AppState::new(config));

  plugins::App::new().register(plugins::server::Plugin).run(app).await;

  tokio::signal::ctrl_c().await?;
  info!("Shutting down");
  Ok(())
}
