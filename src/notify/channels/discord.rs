use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration;
use crate::notify::{category_color, AlertContext, NotificationChannel, NotifierError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub webhook_url: String,
    #[serde(with = "duration")]
    pub interval: Duration,
}

#[derive(Debug, Serialize)]
struct DiscordMessage {
    embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
}

/// Discord incoming webhook with a single rich embed
pub struct DiscordChannel {
    config: DiscordConfig,
    client: reqwest::Client,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_message(alert: &AlertContext) -> DiscordMessage {
        DiscordMessage {
            embeds: vec![DiscordEmbed {
                title: "🚨 Database Alert 🚨".to_string(),
                description: format!(
                    "**Instance:** {}\n**Query:** {}\n**Category:** {}\n**Message:** {}\n**Value:** {}",
                    alert.instance, alert.probe, alert.category, alert.message, alert.value
                ),
                color: category_color(&alert.category),
                timestamp: alert.timestamp.to_rfc3339(),
            }],
        }
    }
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn min_interval(&self) -> Duration {
        self.config.interval
    }

    async fn send(&self, alert: &AlertContext) -> Result<(), NotifierError> {
        let message = Self::build_message(alert);
        super::post_json(&self.client, "discord", &self.config.webhook_url, &message, None).await?;

        tracing::debug!(probe = %alert.probe, "Discord notification sent");
        Ok(())
    }
}
