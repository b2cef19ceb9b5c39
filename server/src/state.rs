use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::{BotCheck, TokenService};
use crate::config::Config;
use crate::events::EventStore;

/// Shared handles injected into every handler. Built once at start-up.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub events: EventStore,
    pub tokens: TokenService,
    pub bot_check: Option<BotCheck>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let tokens = TokenService::new(&config.jwt_secret, config.jwt_ttl_secs);
        let bot_check = config
            .turnstile
            .clone()
            .map(|turnstile| BotCheck::new(reqwest::Client::new(), turnstile));

        Self {
            events: EventStore::new(pool.clone()),
            pool,
            config: Arc::new(config),
            tokens,
            bot_check,
        }
    }
}
