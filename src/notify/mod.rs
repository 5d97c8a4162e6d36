//! Notification delivery
//!
//! Triggered rules are turned into an [`AlertContext`] and fanned out to
//! [`NotificationChannel`] implementations looked up by name in the
//! [`ChannelRegistry`]. Each channel owns its credentials, enabled flag and
//! minimum resend interval; the [`Dispatcher`] owns the fan-out and records
//! successful sends with the target's rate limiter.

pub mod channels;
pub mod dispatcher;
pub mod registry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::alerts::AlertRule;
use crate::probe::Scalar;

pub use channels::ChannelsConfig;
pub use dispatcher::{ChannelOutcome, DispatchReport, Dispatcher};
pub use registry::ChannelRegistry;

/// Everything a channel needs to render one alert
#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    /// Monitored instance name
    pub instance: String,
    /// Probe (query) name
    pub probe: String,
    /// Rendered rule message
    pub message: String,
    pub category: String,
    /// Recipient address from the rule
    pub to: String,
    /// String rendering of the value that triggered the rule
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertContext {
    pub fn new(instance: &str, probe: &str, rule: &AlertRule, value: &Scalar) -> Self {
        Self {
            instance: instance.to_string(),
            probe: probe.to_string(),
            message: rule.render_message(instance, probe, value),
            category: rule.category.clone(),
            to: rule.to.clone(),
            value: value.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// A notification transport
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Lowercase channel name used in rules and rate-limit keys
    fn name(&self) -> &str;

    fn enabled(&self) -> bool;

    /// Minimum time between two successful sends for the same probe
    fn min_interval(&self) -> Duration;

    async fn send(&self, alert: &AlertContext) -> Result<(), NotifierError>;
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("{channel} request failed: {message}")]
    Http { channel: String, message: String },

    #[error("{channel} returned status {status}: {body}")]
    Status {
        channel: String,
        status: u16,
        body: String,
    },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Invalid channel configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Colour associated with an alert category, as `0xRRGGBB`
pub fn category_color(category: &str) -> u32 {
    match category.to_lowercase().as_str() {
        "performance" => 0xffa500,
        "storage" => 0xffff00,
        "security" => 0xff0000,
        "maintenance" => 0x0080ff,
        _ => 0xff0000,
    }
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Operator;

    #[test]
    fn test_context_from_rule() {
        let rule = AlertRule::new(Operator::Gt, 100)
            .with_message("{{value}} active connections")
            .with_category("performance")
            .with_recipient("ops@example.com");
        let ctx = AlertContext::new("primary", "connections", &rule, &Scalar::Int(150));

        assert_eq!(ctx.instance, "primary");
        assert_eq!(ctx.message, "150 active connections");
        assert_eq!(ctx.value, "150");
        assert_eq!(ctx.to, "ops@example.com");
    }

    #[test]
    fn test_category_color() {
        assert_eq!(category_color("Performance"), 0xffa500);
        assert_eq!(category_color("maintenance"), 0x0080ff);
        assert_eq!(category_color("anything"), 0xff0000);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }
}
