//! YAML configuration

pub mod duration;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alerts::AlertRule;
use crate::notify::ChannelsConfig;

/// SQL prefix marking a probe that fires once at startup instead of querying
pub const STARTUP_PROBE_PREFIX: &str = "[started]";

/// Default per-probe query timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub queries: Vec<ProbeSpec>,
    #[serde(default)]
    pub alerts: ChannelsConfig,
}

impl Config {
    /// Read, parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.alerts.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.databases.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one entry under `databases` is required".to_string(),
            ));
        }

        let mut instances = HashSet::new();
        for db in &self.databases {
            let instance = db.instance_name();
            if instance.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "database on host '{}' needs an instance or database name",
                    db.host
                )));
            }
            if !instances.insert(instance.to_string()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate instance name '{}'",
                    instance
                )));
            }
        }

        let mut names = HashSet::new();
        for probe in &self.queries {
            if probe.name.trim().is_empty() {
                return Err(ConfigError::Invalid("query with an empty name".to_string()));
            }
            if !names.insert(probe.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate query name '{}'",
                    probe.name
                )));
            }
            if probe.sql.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "query '{}' has no sql",
                    probe.name
                )));
            }
            if probe.interval.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "query '{}' needs an interval greater than zero",
                    probe.name
                )));
            }
            if probe.timeout.is_some_and(|t| t.is_zero()) {
                return Err(ConfigError::Invalid(format!(
                    "query '{}' has a zero timeout",
                    probe.name
                )));
            }
        }

        Ok(())
    }
}

/// One monitored PostgreSQL instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Display name; defaults to the database name
    #[serde(default)]
    pub instance: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_sslmode() -> String {
    "disable".to_string()
}

impl DatabaseConfig {
    pub fn new(instance: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            host: default_host(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            database: database.into(),
            sslmode: default_sslmode(),
        }
    }

    pub fn instance_name(&self) -> &str {
        if self.instance.is_empty() {
            &self.database
        } else {
            &self.instance
        }
    }
}

/// `logging:` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file written next to stdout; truncated at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

/// A SQL probe (`queries:` entry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub name: String,
    pub sql: String,
    #[serde(with = "duration")]
    pub interval: Duration,
    /// Query timeout; [`DEFAULT_PROBE_TIMEOUT`] when absent
    #[serde(default, with = "duration::option", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub alert_rules: Vec<AlertRule>,
    /// Carried through from the file; not interpreted
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
}

impl ProbeSpec {
    pub fn new(name: impl Into<String>, sql: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            interval,
            timeout: None,
            alert_rules: Vec::new(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_rule(mut self, rule: AlertRule) -> Self {
        self.alert_rules.push(rule);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_PROBE_TIMEOUT)
    }

    /// A `[started]` probe never reaches the database
    pub fn is_startup_probe(&self) -> bool {
        self.sql.trim_start().starts_with(STARTUP_PROBE_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Operator;
    use crate::probe::Scalar;
    use std::io::Write;

    const SAMPLE: &str = r#"
databases:
  - instance: primary
    host: db1.internal
    username: monitor
    password: secret
    database: app
  - database: reporting
    port: 6432
    sslmode: require

logging:
  file_path: /var/log/pgalert.log

queries:
  - name: connections
    sql: SELECT count(*) FROM pg_stat_activity
    interval: 30s
    alert_rules:
      - condition: gt
        value: 100
        message: "{{value}} connections on {{instance}}"
        category: performance
        channels: [telegram, Email]
        alert_hours:
          start: "08:00"
          end: "20:00"
          timezone: Europe/Berlin
          days: [mon, tue, wed, thu, fri]
  - name: started
    sql: "[started] monitor is up"
    interval: 1h30m
    timeout: 5s
    alert_rules:
      - condition: eq
        value: "1"
        execute_action: /usr/local/bin/notify-start

alerts:
  telegram:
    enabled: true
    bot_token: "123:abc"
    chat_id: "-100"
    interval: 5m
  email:
    enabled: false
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.databases.len(), 2);
        assert_eq!(config.databases[0].instance_name(), "primary");
        assert_eq!(config.databases[0].port, 5432);
        assert_eq!(config.databases[0].sslmode, "disable");
        assert_eq!(config.databases[1].instance_name(), "reporting");
        assert_eq!(config.databases[1].port, 6432);
        assert_eq!(config.databases[1].host, "localhost");

        assert_eq!(
            config.logging.file_path.as_deref(),
            Some(Path::new("/var/log/pgalert.log"))
        );

        let connections = &config.queries[0];
        assert_eq!(connections.interval, Duration::from_secs(30));
        assert_eq!(connections.timeout(), DEFAULT_PROBE_TIMEOUT);
        assert!(!connections.is_startup_probe());
        let rule = &connections.alert_rules[0];
        assert_eq!(rule.condition, Operator::Gt);
        assert_eq!(rule.value, Scalar::Int(100));
        assert_eq!(rule.channels, vec!["telegram", "Email"]);
        assert_eq!(rule.alert_hours.as_ref().unwrap().days.len(), 5);

        let started = &config.queries[1];
        assert!(started.is_startup_probe());
        assert_eq!(started.interval, Duration::from_secs(90 * 60));
        assert_eq!(started.timeout(), Duration::from_secs(5));
        assert_eq!(started.alert_rules[0].value, Scalar::Text("1".into()));
        assert_eq!(started.alert_rules[0].action(), Some("/usr/local/bin/notify-start"));

        assert!(config.alerts.telegram.enabled);
        assert_eq!(config.alerts.telegram.interval, Duration::from_secs(300));
    }

    #[test]
    fn test_channel_interval_defaults() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.alerts.email.interval, Duration::from_secs(180));
        assert_eq!(config.alerts.whatsapp.interval, Duration::from_secs(120));
        assert!(config.alerts.webhook.interval.is_zero());
    }

    #[test]
    fn test_rejects_missing_databases() {
        let err = Config::from_yaml_str("queries: []").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let yaml = r#"
databases:
  - database: app
queries:
  - name: q
    sql: SELECT 1
    interval: 0s
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("interval greater than zero"));
    }

    #[test]
    fn test_rejects_unknown_operator() {
        let yaml = r#"
databases:
  - database: app
queries:
  - name: q
    sql: SELECT 1
    interval: 10s
    alert_rules:
      - condition: between
        value: 1
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_rejects_duplicate_instances() {
        let yaml = r#"
databases:
  - database: app
  - instance: app
    database: other
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate instance name"));
    }

    #[test]
    fn test_rejects_duplicate_query_names() {
        let yaml = r#"
databases:
  - database: app
queries:
  - name: dup
    sql: SELECT 1
    interval: 10s
  - name: dup
    sql: SELECT 2
    interval: 20s
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("duplicate query name 'dup'"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.queries.len(), 2);

        let err = Config::load("/nonexistent/pgalert.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
