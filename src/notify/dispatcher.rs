//! Fan-out of triggered alerts to notification channels

use std::fmt;
use std::sync::Arc;

use crate::alerts::{AlertRule, AlertTracker};

use super::{AlertContext, ChannelRegistry, NotificationChannel};

/// What happened to one channel during a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Sent,
    Disabled,
    RateLimited,
    Failed(String),
    /// Named by the rule but not registered
    Unknown,
}

impl fmt::Display for ChannelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelOutcome::Sent => write!(f, "sent"),
            ChannelOutcome::Disabled => write!(f, "disabled"),
            ChannelOutcome::RateLimited => write!(f, "rate limited"),
            ChannelOutcome::Failed(e) => write!(f, "failed: {}", e),
            ChannelOutcome::Unknown => write!(f, "unknown channel"),
        }
    }
}

/// Per-channel results of one dispatch, in resolution order
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<(String, ChannelOutcome)>,
}

impl DispatchReport {
    pub fn outcome(&self, channel: &str) -> Option<&ChannelOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, outcome)| outcome)
    }

    pub fn sent_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == ChannelOutcome::Sent)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ChannelOutcome::Failed(_)))
            .count()
    }
}

/// A channel name resolved against the registry
pub type ResolvedChannel = (String, Option<Arc<dyn NotificationChannel>>);

/// Fans one alert out to the channels a rule selects
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: ChannelRegistry,
}

impl Dispatcher {
    pub fn new(registry: ChannelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// The rule's explicit channel list, or every enabled channel
    pub fn resolve_channels(&self, rule: &AlertRule) -> Vec<ResolvedChannel> {
        if rule.channels.is_empty() {
            return self
                .registry
                .enabled()
                .into_iter()
                .map(|c| (c.name().to_string(), Some(c)))
                .collect();
        }

        let mut resolved: Vec<ResolvedChannel> = Vec::with_capacity(rule.channels.len());
        for name in &rule.channels {
            let name = name.trim().to_lowercase();
            if name.is_empty() || resolved.iter().any(|(n, _)| *n == name) {
                continue;
            }
            let channel = self.registry.get(&name);
            resolved.push((name, channel));
        }
        resolved
    }

    /// Send to every resolved channel. A failing channel never stops the
    /// others and only successful sends are recorded with the tracker. A key
    /// with a send already in progress counts as rate limited.
    pub async fn dispatch(
        &self,
        tracker: &AlertTracker,
        probe: &str,
        rule: &AlertRule,
        alert: &AlertContext,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (name, channel) in self.resolve_channels(rule) {
            let outcome = match channel {
                None => {
                    tracing::warn!(
                        instance = %alert.instance,
                        probe = %probe,
                        channel = %name,
                        "Alert names an unknown notification channel"
                    );
                    ChannelOutcome::Unknown
                }
                Some(channel) if !channel.enabled() => {
                    tracing::debug!(probe = %probe, channel = %name, "Channel disabled, skipping");
                    ChannelOutcome::Disabled
                }
                Some(channel) => match tracker.try_claim(probe, &name, channel.min_interval()) {
                    None => {
                        tracing::debug!(
                            instance = %alert.instance,
                            probe = %probe,
                            channel = %name,
                            "Channel interval not elapsed, skipping"
                        );
                        ChannelOutcome::RateLimited
                    }
                    Some(claim) => match channel.send(alert).await {
                        Ok(()) => {
                            claim.succeeded();
                            tracing::info!(
                                instance = %alert.instance,
                                probe = %probe,
                                channel = %name,
                                "Alert sent"
                            );
                            ChannelOutcome::Sent
                        }
                        Err(e) => {
                            tracing::error!(
                                instance = %alert.instance,
                                probe = %probe,
                                channel = %name,
                                error = %e,
                                "Failed to send alert"
                            );
                            ChannelOutcome::Failed(e.to_string())
                        }
                    },
                },
            };
            report.outcomes.push((name, outcome));
        }

        report
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::notify::{AlertContext, NotificationChannel, NotifierError};

    /// In-memory channel recording every alert it is asked to send
    pub struct RecordingChannel {
        pub name: String,
        pub enabled: bool,
        pub interval: Duration,
        pub fail: bool,
        pub delay: Option<Duration>,
        pub sent: Mutex<Vec<AlertContext>>,
    }

    impl RecordingChannel {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                enabled: true,
                interval: Duration::ZERO,
                fail: false,
                delay: None,
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn with_interval(mut self, interval: Duration) -> Self {
            self.interval = interval;
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn disabled(mut self) -> Self {
            self.enabled = false;
            self
        }

        pub fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        pub fn into_arc(self) -> Arc<Self> {
            Arc::new(self)
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            &self.name
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        fn min_interval(&self) -> Duration {
            self.interval
        }

        async fn send(&self, alert: &AlertContext) -> Result<(), NotifierError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sent.lock().push(alert.clone());
            if self.fail {
                return Err(NotifierError::Status {
                    channel: self.name.clone(),
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(())
        }
    }
}
