//! Named notification channels

use std::sync::Arc;

use super::channels::{
    self, ChannelsConfig, DiscordChannel, EmailChannel, TeamsChannel, TelegramChannel,
    WebhookChannel, WhatsAppChannel,
};
use super::{NotificationChannel, NotifierError};

/// Named notification channels, in registration order
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel, replacing any channel with the same name
    pub fn register(&mut self, channel: Arc<dyn NotificationChannel>) {
        let name = channel.name().to_lowercase();
        self.channels.retain(|c| c.name().to_lowercase() != name);
        self.channels.push(channel);
    }

    /// Build every built-in channel from the `alerts:` section.
    ///
    /// Disabled channels are registered too so that rules naming them
    /// resolve to a skip instead of an unknown channel.
    pub fn from_config(config: &ChannelsConfig) -> Result<Self, NotifierError> {
        let client = channels::http_client()?;
        let mut registry = Self::new();

        registry.register(Arc::new(WebhookChannel::new(config.webhook.clone(), client.clone())));
        registry.register(Arc::new(TelegramChannel::new(config.telegram.clone(), client.clone())));
        registry.register(Arc::new(DiscordChannel::new(config.discord.clone(), client.clone())));
        registry.register(Arc::new(TeamsChannel::new(config.teams.clone(), client.clone())));
        registry.register(Arc::new(EmailChannel::new(config.email.clone())?));
        registry.register(Arc::new(WhatsAppChannel::new(config.whatsapp.clone(), client)));

        tracing::info!(enabled = ?registry.enabled_names(), "Notification channels configured");
        Ok(registry)
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<Arc<dyn NotificationChannel>> {
        let name = name.trim().to_lowercase();
        self.channels
            .iter()
            .find(|c| c.name().to_lowercase() == name)
            .cloned()
    }

    /// Enabled channels, in registration order
    pub fn enabled(&self) -> Vec<Arc<dyn NotificationChannel>> {
        self.channels.iter().filter(|c| c.enabled()).cloned().collect()
    }

    pub fn enabled_names(&self) -> Vec<String> {
        self.channels
            .iter()
            .filter(|c| c.enabled())
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.names())
            .finish()
    }
}
