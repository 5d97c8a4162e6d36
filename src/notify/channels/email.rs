use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::duration;
use crate::notify::{escape_html, AlertContext, NotificationChannel, NotifierError};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3 * 60);

const FOOTER: &str = "This alert was automatically generated by pgalert.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    /// Implicit TLS from the first byte; otherwise STARTTLS when offered
    pub tls: bool,
    #[serde(with = "duration")]
    pub interval: Duration,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from_email: String::new(),
            from_name: String::new(),
            tls: false,
            interval: Duration::ZERO,
        }
    }
}

/// SMTP delivery of a text + HTML alert
pub struct EmailChannel {
    config: EmailConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailChannel {
    /// Builds the SMTP transport up front when the channel is enabled
    pub fn new(config: EmailConfig) -> Result<Self, NotifierError> {
        let transport = if config.enabled {
            Some(Self::build_transport(&config)?)
        } else {
            None
        };
        Ok(Self { config, transport })
    }

    fn build_transport(
        config: &EmailConfig,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifierError> {
        if config.smtp_host.is_empty() {
            return Err(NotifierError::InvalidConfig(
                "email smtp_host is required".to_string(),
            ));
        }

        let mut builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| NotifierError::Smtp(e.to_string()))?
        } else {
            let params = TlsParameters::new(config.smtp_host.clone())
                .map_err(|e| NotifierError::Smtp(e.to_string()))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .tls(Tls::Opportunistic(params))
        };
        builder = builder.port(config.smtp_port).timeout(Some(super::SEND_TIMEOUT));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    fn sender(&self) -> Result<Mailbox, NotifierError> {
        let address = self
            .config
            .from_email
            .parse()
            .map_err(|e| NotifierError::InvalidConfig(format!("from_email: {}", e)))?;
        let name = (!self.config.from_name.is_empty()).then(|| self.config.from_name.clone());
        Ok(Mailbox::new(name, address))
    }

    /// Comma separated recipient list from the rule's `to`
    fn recipients(to: &str) -> Result<Vec<Mailbox>, NotifierError> {
        let list: Vec<&str> = to
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if list.is_empty() {
            return Err(NotifierError::InvalidConfig(
                "email alert has no recipient".to_string(),
            ));
        }

        list.into_iter()
            .map(|r| {
                r.parse::<Mailbox>()
                    .map_err(|e| NotifierError::InvalidConfig(format!("recipient {}: {}", r, e)))
            })
            .collect()
    }

    fn subject(alert: &AlertContext) -> String {
        format!("[{}] Database Alert: {}", alert.instance, alert.probe)
    }

    fn text_body(alert: &AlertContext) -> String {
        format!(
            "Database Alert: {probe}\n\n\
             Instance: {instance}\n\
             Query: {probe}\n\
             Category: {category}\n\
             Message: {message}\n\
             Value: {value}\n\
             Timestamp: {time}\n\
             Recipient: {to}\n\n\
             {FOOTER}",
            probe = alert.probe,
            instance = alert.instance,
            category = alert.category,
            message = alert.message,
            value = alert.value,
            time = alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            to = alert.to,
        )
    }

    fn html_body(alert: &AlertContext) -> String {
        let category = escape_html(&alert.category);
        let message = escape_html(&alert.message);
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<style>
body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
.header {{ background-color: #f4f4f4; padding: 10px; border-left: 4px solid #d32f2f; }}
.alert-info {{ background-color: #fff3cd; padding: 15px; border-radius: 5px; margin: 10px 0; border-left: 4px solid #{color:06x}; }}
table {{ border-collapse: collapse; width: 100%; margin: 10px 0; }}
th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
th {{ background-color: #f2f2f2; }}
</style>
</head>
<body>
<div class="header"><h2>🚨 Database Alert</h2></div>
<div class="alert-info {category}">
<h3>{message}</h3>
</div>
<table>
<tr><th>Instance</th><td>{instance}</td></tr>
<tr><th>Query</th><td>{probe}</td></tr>
<tr><th>Category</th><td>{category}</td></tr>
<tr><th>Value</th><td>{value}</td></tr>
<tr><th>Timestamp</th><td>{time}</td></tr>
<tr><th>Recipient</th><td>{to}</td></tr>
</table>
<p><em>{FOOTER}</em></p>
</body>
</html>"#,
            color = crate::notify::category_color(&alert.category),
            category = category,
            message = message,
            instance = escape_html(&alert.instance),
            probe = escape_html(&alert.probe),
            value = escape_html(&alert.value),
            time = alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            to = escape_html(&alert.to),
        )
    }

    fn build_message(&self, alert: &AlertContext) -> Result<Message, NotifierError> {
        let mut builder = Message::builder()
            .from(self.sender()?)
            .subject(Self::subject(alert));
        for recipient in Self::recipients(&alert.to)? {
            builder = builder.to(recipient);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                Self::text_body(alert),
                Self::html_body(alert),
            ))
            .map_err(|e| NotifierError::Smtp(e.to_string()))
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn min_interval(&self) -> Duration {
        self.config.interval
    }

    async fn send(&self, alert: &AlertContext) -> Result<(), NotifierError> {
        let transport = self.transport.as_ref().ok_or_else(|| {
            NotifierError::InvalidConfig("email transport is not configured".to_string())
        })?;

        let message = self.build_message(alert)?;
        transport
            .send(message)
            .await
            .map_err(|e| NotifierError::Smtp(e.to_string()))?;

        tracing::debug!(probe = %alert.probe, to = %alert.to, "Email notification sent");
        Ok(())
    }
}
