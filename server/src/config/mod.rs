use std::{env, fmt::Display, net::IpAddr, str::FromStr};

use chrono_tz::Tz;
use thiserror::Error;
use tracing::{info, warn};

pub mod cors;
pub mod redirect;
pub mod security;

pub use cors::create_cors_layer;
pub use redirect::LegacyEventsRedirectLayer;
pub use security::security_headers;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/farm_events";
const DEFAULT_JWT_SECRET: &str = "your_jwt_secret";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
pub const TURNSTILE_VERIFY_URL: &str =
    "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be set")]
    Missing { key: &'static str },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct TurnstileConfig {
    pub secret_key: String,
    pub verify_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: String,
    /// Lifetime of issued tokens; `None` issues tokens without an `exp` claim.
    pub jwt_ttl_secs: Option<u64>,
    /// Login bot-check gate, enabled only when a secret key is configured.
    pub turnstile: Option<TurnstileConfig>,
    pub timezone: Tz,
    pub recurrence_limit: u16,
    pub cors_allowed_origins: Vec<String>,
    pub production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            host: IpAddr::from([0, 0, 0, 0]),
            port: 3001,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_ttl_secs: None,
            turnstile: None,
            timezone: Tz::UTC,
            recurrence_limit: 366,
            cors_allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            production: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing { key: "DATABASE_URL" })?;

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, falling back to the development secret");
            defaults.jwt_secret.clone()
        });

        let turnstile = env::var("TURNSTILE_SECRET_KEY")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .map(|secret_key| TurnstileConfig {
                secret_key,
                verify_url: env::var("TURNSTILE_VERIFY_URL")
                    .unwrap_or_else(|_| TURNSTILE_VERIFY_URL.to_string()),
            });
        if turnstile.is_some() {
            info!("Login bot check enabled");
        }

        let timezone: Tz = load_or("SITE_TIMEZONE", defaults.timezone)?;

        Ok(Self {
            database_url,
            max_connections: load_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            host: load_or("HOST", defaults.host)?,
            port: load_or("PORT", defaults.port)?,
            jwt_secret,
            jwt_ttl_secs: load_optional("JWT_TTL_SECS")?,
            turnstile,
            timezone,
            recurrence_limit: load_or("RECURRENCE_MAX_OCCURRENCES", defaults.recurrence_limit)?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|value| split_origins(&value))
                .unwrap_or(defaults.cors_allowed_origins),
            production: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        })
    }
}

fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn load_optional<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }),
        _ => Ok(None),
    }
}

fn load_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match load_optional(key)? {
        Some(value) => Ok(value),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
