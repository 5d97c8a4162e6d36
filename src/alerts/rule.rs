//! Alert rule configuration types

use serde::{Deserialize, Serialize};

use crate::probe::Scalar;

/// Category assigned to alerts synthesized from probe failures
pub const ERROR_CATEGORY: &str = "error";

/// Comparison applied between a probe value and a rule threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold condition plus routing metadata attached to a probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// Comparison operator
    pub condition: Operator,
    /// Threshold the first column is compared against
    #[serde(default)]
    pub value: Scalar,
    /// Message template, see [`AlertRule::render_message`]
    #[serde(default)]
    pub message: String,
    /// Free-form tag; drives channel colour coding
    #[serde(default)]
    pub category: String,
    /// Recipient address (email address for the SMTP channel)
    #[serde(default)]
    pub to: String,
    /// Explicit channel subset; empty means every enabled channel
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    /// Instance allow-list; empty means every instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<String>,
    /// Command run after dispatch when the rule fires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute_action: Option<String>,
    /// Time window outside of which the rule never notifies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_hours: Option<AlertHours>,
}

impl AlertRule {
    /// Create a rule with the given condition and threshold
    pub fn new(condition: Operator, value: impl Into<Scalar>) -> Self {
        Self {
            condition,
            value: value.into(),
            message: String::new(),
            category: String::new(),
            to: String::new(),
            channels: Vec::new(),
            instances: Vec::new(),
            execute_action: None,
            alert_hours: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_recipient(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_instances<I, S>(mut self, instances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.instances = instances.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_action(mut self, command: impl Into<String>) -> Self {
        self.execute_action = Some(command.into());
        self
    }

    pub fn with_alert_hours(mut self, hours: AlertHours) -> Self {
        self.alert_hours = Some(hours);
        self
    }

    /// Whether this rule applies to the named instance
    pub fn applies_to(&self, instance: &str) -> bool {
        self.instances.is_empty() || self.instances.iter().any(|i| i == instance)
    }

    /// The action command, if one is configured and not blank
    pub fn action(&self) -> Option<&str> {
        self.execute_action
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
    }

    /// Substitute `{{instance}}`, `{{query}}`, `{{value}}` and
    /// `{{threshold}}` placeholders in the message template.
    pub fn render_message(&self, instance: &str, probe: &str, value: &Scalar) -> String {
        self.message
            .replace("{{instance}}", instance)
            .replace("{{query}}", probe)
            .replace("{{value}}", &value.to_string())
            .replace("{{threshold}}", &self.value.to_string())
    }

    /// Copy of this rule describing a probe failure instead of a threshold hit
    pub fn as_error(&self, probe: &str, error: &str) -> Self {
        let mut rule = self.clone();
        rule.message = format!("Error executing query {}: {}", probe, error);
        rule.category = ERROR_CATEGORY.to_string();
        rule.value = Scalar::Text(error.to_string());
        rule
    }
}

/// Time-of-day window during which a rule may notify
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertHours {
    /// Window start, `HH:MM` (24-hour)
    pub start: String,
    /// Window end, `HH:MM`; earlier than `start` means the window spans midnight
    pub end: String,
    /// IANA zone name; process local time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Allowed weekdays (`mon`..`sun`); every day when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<String>,
}

impl AlertHours {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            timezone: None,
            days: Vec::new(),
        }
    }

    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }

    pub fn with_days<I, S>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.days = days.into_iter().map(Into::into).collect();
        self
    }
}
