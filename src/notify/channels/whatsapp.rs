use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration;
use crate::notify::{AlertContext, NotificationChannel, NotifierError};

pub const DEFAULT_API_URL: &str = "https://graph.facebook.com/v22.0";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub access_token: String,
    pub phone_number_id: String,
    pub to_number: String,
    #[serde(with = "duration")]
    pub interval: Duration,
    /// Graph API base URL, including the version segment
    pub api_url: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            phone_number_id: String::new(),
            to_number: String::new(),
            interval: Duration::ZERO,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WhatsAppMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: WhatsAppText,
}

#[derive(Debug, Serialize)]
struct WhatsAppText {
    body: String,
}

/// WhatsApp Business Cloud API text message
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn format_body(alert: &AlertContext) -> String {
        format!(
            "🚨 *Database Alert* 🚨\n\n\
             *Instance:* {}\n\
             *Query:* {}\n\
             *Category:* {}\n\
             *Message:* {}\n\
             *Time:* {}\n\
             *Value:* {}",
            alert.instance,
            alert.probe,
            alert.category,
            alert.message,
            alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
            alert.value,
        )
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn min_interval(&self) -> Duration {
        self.config.interval
    }

    async fn send(&self, alert: &AlertContext) -> Result<(), NotifierError> {
        if self.config.phone_number_id.is_empty() || self.config.to_number.is_empty() {
            return Err(NotifierError::InvalidConfig(
                "whatsapp phone_number_id and to_number are required".to_string(),
            ));
        }

        let message = WhatsAppMessage {
            messaging_product: "whatsapp",
            to: &self.config.to_number,
            kind: "text",
            text: WhatsAppText {
                body: Self::format_body(alert),
            },
        };
        let url = format!(
            "{}/{}/messages",
            self.config.api_url.trim_end_matches('/'),
            self.config.phone_number_id
        );

        let response = super::post_json(
            &self.client,
            "whatsapp",
            &url,
            &message,
            Some(&self.config.access_token),
        )
        .await?;

        tracing::debug!(probe = %alert.probe, response = %response, "WhatsApp notification sent");
        Ok(())
    }
}
