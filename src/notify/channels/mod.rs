//! Built-in notification channels
//!
//! One module per transport. Each module owns its configuration block
//! (the matching key under `alerts:` in the config file) and its wire
//! format.

pub mod discord;
pub mod email;
pub mod teams;
pub mod telegram;
pub mod webhook;
pub mod whatsapp;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::NotifierError;

pub use discord::{DiscordChannel, DiscordConfig};
pub use email::{EmailChannel, EmailConfig};
pub use teams::{TeamsChannel, TeamsConfig};
pub use telegram::{TelegramChannel, TelegramConfig};
pub use webhook::{WebhookChannel, WebhookConfig};
pub use whatsapp::{WhatsAppChannel, WhatsAppConfig};

/// Timeout applied to every outbound channel call
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of a response body kept for logging
pub const MAX_BODY_LENGTH: usize = 4000;

/// The `alerts:` section of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub webhook: WebhookConfig,
    pub telegram: TelegramConfig,
    pub discord: DiscordConfig,
    pub teams: TeamsConfig,
    pub email: EmailConfig,
    pub whatsapp: WhatsAppConfig,
}

impl ChannelsConfig {
    /// Fill in resend intervals left unset
    pub fn apply_defaults(&mut self) {
        if self.email.interval.is_zero() {
            self.email.interval = email::DEFAULT_INTERVAL;
        }
        if self.whatsapp.interval.is_zero() {
            self.whatsapp.interval = whatsapp::DEFAULT_INTERVAL;
        }
    }
}

/// Truncate a string to at most `max_len` bytes, respecting char boundaries
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... [truncated]", &s[..cut])
}

/// Build the HTTP client shared by the HTTP channels
pub fn http_client() -> Result<reqwest::Client, NotifierError> {
    reqwest::Client::builder()
        .timeout(SEND_TIMEOUT)
        .build()
        .map_err(|e| NotifierError::Http {
            channel: "client".to_string(),
            message: e.to_string(),
        })
}

/// POST a JSON body and map transport failures and non-2xx answers to errors
pub(crate) async fn post_json<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    channel: &str,
    url: &str,
    body: &T,
    bearer: Option<&str>,
) -> Result<String, NotifierError> {
    if url.is_empty() {
        return Err(NotifierError::InvalidConfig(format!(
            "{} endpoint is not configured",
            channel
        )));
    }

    let payload = serde_json::to_vec(body)?;
    let mut request = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(payload);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(|e| NotifierError::Http {
        channel: channel.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let text = truncate_string(&text, MAX_BODY_LENGTH);

    if !status.is_success() {
        return Err(NotifierError::Status {
            channel: channel.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }

    Ok(text)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::TimeZone;

    use crate::notify::AlertContext;

    pub fn sample_alert() -> AlertContext {
        AlertContext {
            instance: "primary".to_string(),
            probe: "long_running".to_string(),
            message: "Query running for <5m> & counting".to_string(),
            category: "performance".to_string(),
            to: "dba@example.com".to_string(),
            value: "312".to_string(),
            timestamp: chrono::Utc.with_ymd_and_hms(2024, 3, 4, 10, 30, 0).unwrap(),
        }
    }
}
