use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration;
use crate::notify::{AlertContext, NotificationChannel, NotifierError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    #[serde(with = "duration")]
    pub interval: Duration,
}

/// JSON body posted to the generic webhook
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    to: &'a str,
    message: String,
    category: &'a str,
    instance: &'a str,
    value: &'a str,
    timestamp: String,
}

/// Generic JSON webhook
pub struct WebhookChannel {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn min_interval(&self) -> Duration {
        self.config.interval
    }

    async fn send(&self, alert: &AlertContext) -> Result<(), NotifierError> {
        let payload = WebhookPayload {
            kind: "database_alert",
            to: &alert.to,
            message: format!("[{}] {}", alert.probe, alert.message),
            category: &alert.category,
            instance: &alert.instance,
            value: &alert.value,
            timestamp: alert.timestamp.to_rfc3339(),
        };

        super::post_json(&self.client, "webhook", &self.config.url, &payload, None).await?;

        tracing::debug!(probe = %alert.probe, url = %self.config.url, "Webhook notification sent");
        Ok(())
    }
}
