//! Cloudflare Turnstile verification for the login form.

use serde::Deserialize;

use crate::config::TurnstileConfig;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

#[derive(Clone)]
pub struct BotCheck {
    client: reqwest::Client,
    config: TurnstileConfig,
}

impl BotCheck {
    pub fn new(client: reqwest::Client, config: TurnstileConfig) -> Self {
        Self { client, config }
    }

    /// Asks the verification service whether `token` was issued to a human
    /// at `remote_ip`.
    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> AppResult<bool> {
        let form = [
            ("secret", self.config.secret_key.as_str()),
            ("response", token),
            ("remoteip", remote_ip.unwrap_or_default()),
        ];

        let outcome: SiteVerifyResponse = self
            .client
            .post(&self.config.verify_url)
            .form(&form)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AppError::ExternalServiceError(format!("bot check request failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("bot check response invalid: {e}")))?;

        if !outcome.success {
            tracing::info!(errors = ?outcome.error_codes, "Bot check rejected login attempt");
        }
        Ok(outcome.success)
    }
}
