use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration;
use crate::notify::{category_color, AlertContext, NotificationChannel, NotifierError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamsConfig {
    pub enabled: bool,
    pub webhook_url: String,
    #[serde(with = "duration")]
    pub interval: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TeamsMessage {
    #[serde(rename = "@type")]
    kind: &'static str,
    #[serde(rename = "@context")]
    context: &'static str,
    theme_color: String,
    summary: String,
    sections: Vec<TeamsSection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TeamsSection {
    activity_title: &'static str,
    activity_subtitle: String,
    text: String,
    facts: Vec<TeamsFact>,
}

#[derive(Debug, Serialize)]
struct TeamsFact {
    name: &'static str,
    value: String,
}

/// Microsoft Teams incoming webhook (`MessageCard`)
pub struct TeamsChannel {
    config: TeamsConfig,
    client: reqwest::Client,
}

impl TeamsChannel {
    pub fn new(config: TeamsConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_message(alert: &AlertContext) -> TeamsMessage {
        TeamsMessage {
            kind: "MessageCard",
            context: "http://schema.org/extensions",
            theme_color: format!("{:06X}", category_color(&alert.category)),
            summary: format!("Database Alert: {}", alert.probe),
            sections: vec![TeamsSection {
                activity_title: "🚨 Database Alert",
                activity_subtitle: alert.message.clone(),
                text: format!(
                    "**Instance:** {}\n**Query:** {}\n**Message:** {}\n**Value:** {}",
                    alert.instance, alert.probe, alert.message, alert.value
                ),
                facts: vec![
                    TeamsFact { name: "Instance", value: alert.instance.clone() },
                    TeamsFact { name: "Query", value: alert.probe.clone() },
                    TeamsFact { name: "Category", value: alert.category.clone() },
                    TeamsFact { name: "Time", value: alert.timestamp.to_rfc3339() },
                ],
            }],
        }
    }
}

#[async_trait]
impl NotificationChannel for TeamsChannel {
    fn name(&self) -> &str {
        "teams"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn min_interval(&self) -> Duration {
        self.config.interval
    }

    async fn send(&self, alert: &AlertContext) -> Result<(), NotifierError> {
        let message = Self::build_message(alert);
        super::post_json(&self.client, "teams", &self.config.webhook_url, &message, None).await?;

        tracing::debug!(probe = %alert.probe, "Teams notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::channels::test_support::sample_alert;

    #[test]
    fn test_message_card_shape() {
        let message = TeamsChannel::build_message(&sample_alert());
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["@type"], "MessageCard");
        assert_eq!(json["themeColor"], "FFA500");
        assert_eq!(json["summary"], "Database Alert: long_running");
        assert_eq!(json["sections"][0]["facts"][1]["value"], "long_running");
        assert_eq!(json["sections"][0]["activitySubtitle"], "Query running for <5m> & counting");
    }
}
