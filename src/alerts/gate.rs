//! Admission checks run before an alert is dispatched

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use super::{is_within_window, AlertRule, AlertTracker};
use crate::notify::dispatcher::ResolvedChannel;

/// Result of [`AlertGate::admit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// The rule's instance allow-list does not name this instance
    InstanceExcluded,
    OutsideAlertHours,
    /// Every candidate channel is still inside its resend interval
    RateLimited,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

impl fmt::Display for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Admission::Admitted => "admitted",
            Admission::InstanceExcluded => "instance excluded",
            Admission::OutsideAlertHours => "outside alert hours",
            Admission::RateLimited => "rate limited",
        };
        f.write_str(s)
    }
}

/// Instance allow-list, alert hours and rate limiting for one target
#[derive(Debug, Clone, Default)]
pub struct AlertGate {
    tracker: Arc<AlertTracker>,
}

impl AlertGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracker(tracker: Arc<AlertTracker>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &AlertTracker {
        &self.tracker
    }

    /// First failing check wins, in order: instance allow-list, alert
    /// hours, rate limit.
    ///
    /// The rate limit only blocks when at least one enabled channel is
    /// resolved and none of them may send yet; the dispatcher re-checks
    /// every channel individually.
    pub fn admit(
        &self,
        instance: &str,
        probe: &str,
        rule: &AlertRule,
        channels: &[ResolvedChannel],
        now: DateTime<Utc>,
    ) -> Admission {
        if !rule.applies_to(instance) {
            return Admission::InstanceExcluded;
        }

        if !is_within_window(rule.alert_hours.as_ref(), now) {
            return Admission::OutsideAlertHours;
        }

        let mut candidates = channels
            .iter()
            .filter_map(|(name, channel)| channel.as_ref().map(|c| (name, c)))
            .filter(|(_, channel)| channel.enabled())
            .peekable();

        if candidates.peek().is_none() {
            return Admission::Admitted;
        }

        if candidates.any(|(name, channel)| self.tracker.can_send(probe, name, channel.min_interval())) {
            Admission::Admitted
        } else {
            Admission::RateLimited
        }
    }
}
