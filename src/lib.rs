//! pgalert: PostgreSQL probe monitor
//!
//! Periodically runs SQL probes against one or more PostgreSQL instances,
//! compares the first column of every result row against threshold rules
//! and fans triggered alerts out to notification channels, optionally
//! running a remediation command afterwards.
//!
//! # Features
//!
//! - **Probes**: one task per (instance, probe), each on its own interval
//! - **Rules**: `gt`, `lt`, `gte`, `lte`, `eq`, `ne` with numeric coercion of text values
//! - **Gating**: instance allow-lists, alert hours with time zones and weekdays
//! - **Rate limiting**: per (probe, channel) minimum resend interval
//! - **Channels**: webhook, Telegram, Discord, Teams, email (SMTP), WhatsApp
//! - **Actions**: external commands with the alert exposed as `MONITOR_*` variables
//! - **Error alerts**: failing probes produce `error` category alerts
//!
//! # Example
//!
//! ```no_run
//! use pgalert::config::Config;
//! use pgalert::monitor::Monitor;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let monitor = Monitor::connect(config).await?;
//! monitor.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod alerts;
pub mod config;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod probe;

// Re-export commonly used types
pub use action::{ActionExecutor, ActionOutcome};
pub use alerts::{AlertGate, AlertRule, AlertTracker, Operator};
pub use config::{Config, ConfigError};
pub use monitor::{Monitor, MonitorError};
pub use notify::{AlertContext, ChannelRegistry, Dispatcher, NotificationChannel, NotifierError};
pub use probe::{ProbeError, ProbeExecutor, ProbeResult, Scalar};
