use crate::{
  config::Config,
  prelude::*,
  store::{HttpStore, LicenseStore, MemoryStore},
  sv,
  token::TokenCodec,
};

pub struct Services<'a> {
  pub session: sv::Session<'a>,
  pub revoke: sv::Revoke<'a>,
}

pub struct AppState {
  pub store: Arc<dyn LicenseStore>,
  pub tokens: TokenCodec,
  pub config: Config,
}

impl AppState {
  pub fn new(config: Config) -> Self {
    let store: Arc<dyn LicenseStore> = match &config.store_url {
      Some(url) => {
        info!("Using license store at {url}");
        Arc::new(HttpStore::new(
          url,
          config.store_auth.clone(),
          config.store_timeout,
        ))
      }
      None => {
        warn!("STORE_URL not set, licenses are kept in memory only");
        Arc::new(MemoryStore::new())
      }
    };

    Self::with_store(config, store)
  }

  pub fn with_store(config: Config, store: Arc<dyn LicenseStore>) -> Self {
    let tokens = TokenCodec::new(&config);
    Self { store, tokens, config }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      session: sv::Session::new(&*self.store, &self.tokens, &self.config),
      revoke: sv::Revoke::new(&*self.store),
    }
  }
}
