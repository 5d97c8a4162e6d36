use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration;
use crate::notify::{escape_html, AlertContext, NotificationChannel, NotifierError};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
    #[serde(with = "duration")]
    pub interval: Duration,
    /// Bot API base URL
    pub api_url: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            interval: Duration::ZERO,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TelegramMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

/// Telegram Bot API `sendMessage`
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Message text for `parse_mode: HTML`; every interpolated field is escaped
    fn format_text(alert: &AlertContext) -> String {
        format!(
            "🚨 <b>Database Alert</b> 🚨\n\n\
             <b>Instance:</b> {}\n\
             <b>Query:</b> {}\n\
             <b>Category:</b> {}\n\
             <b>Message:</b> {}\n\
             <b>Time:</b> {}\n\
             <b>Value:</b> {}",
            escape_html(&alert.instance),
            escape_html(&alert.probe),
            escape_html(&alert.category),
            escape_html(&alert.message),
            alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
            escape_html(&alert.value),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token
        )
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn min_interval(&self) -> Duration {
        self.config.interval
    }

    async fn send(&self, alert: &AlertContext) -> Result<(), NotifierError> {
        if self.config.bot_token.is_empty() || self.config.chat_id.is_empty() {
            return Err(NotifierError::InvalidConfig(
                "telegram bot_token and chat_id are required".to_string(),
            ));
        }

        let message = TelegramMessage {
            chat_id: &self.config.chat_id,
            text: Self::format_text(alert),
            parse_mode: "HTML",
        };

        super::post_json(&self.client, "telegram", &self.endpoint(), &message, None).await?;

        tracing::debug!(probe = %alert.probe, chat_id = %self.config.chat_id, "Telegram notification sent");
        Ok(())
    }
}
