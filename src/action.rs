//! External remediation commands run when a rule fires

use std::time::Duration;
use tokio::process::Command;

use crate::notify::channels::{truncate_string, MAX_BODY_LENGTH};
use crate::notify::AlertContext;

/// Default wall-clock limit for one action
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// How an action run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    /// Exited with a non-zero status (`None` when killed by a signal)
    Failed { code: Option<i32> },
    TimedOut,
    LaunchFailed(String),
    /// Blank command line
    Empty,
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded)
    }
}

/// Runs a rule's `execute_action` command.
///
/// The command line is split on whitespace and executed directly (no shell).
/// The alert is exposed through `MONITOR_*` environment variables on top of
/// the inherited environment.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    timeout: Duration,
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_TIMEOUT)
    }
}

impl ActionExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Environment passed to the command
    pub fn environment(alert: &AlertContext) -> Vec<(&'static str, String)> {
        vec![
            ("MONITOR_INSTANCE", alert.instance.clone()),
            ("MONITOR_QUERY", alert.probe.clone()),
            ("MONITOR_MESSAGE", alert.message.clone()),
            ("MONITOR_CATEGORY", alert.category.clone()),
            ("MONITOR_TO", alert.to.clone()),
            ("MONITOR_VALUE", alert.value.clone()),
        ]
    }

    /// Run the command and report how it ended. Never returns an error.
    pub async fn execute(&self, command_line: &str, alert: &AlertContext) -> ActionOutcome {
        let mut parts = command_line.split_whitespace();
        let Some(program) = parts.next() else {
            return ActionOutcome::Empty;
        };

        let mut command = Command::new(program);
        command
            .args(parts)
            .envs(Self::environment(alert))
            .kill_on_drop(true);

        tracing::info!(
            instance = %alert.instance,
            probe = %alert.probe,
            command = %command_line,
            "Executing alert action"
        );

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::error!(
                    instance = %alert.instance,
                    probe = %alert.probe,
                    command = %command_line,
                    error = %e,
                    "Failed to launch alert action"
                );
                return ActionOutcome::LaunchFailed(e.to_string());
            }
            Err(_) => {
                tracing::error!(
                    instance = %alert.instance,
                    probe = %alert.probe,
                    command = %command_line,
                    timeout = ?self.timeout,
                    "Alert action timed out"
                );
                return ActionOutcome::TimedOut;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = truncate_string(stdout.trim(), MAX_BODY_LENGTH);
        let stderr = truncate_string(stderr.trim(), MAX_BODY_LENGTH);

        if output.status.success() {
            tracing::info!(
                instance = %alert.instance,
                probe = %alert.probe,
                command = %command_line,
                stdout = %stdout,
                "Alert action completed"
            );
            ActionOutcome::Succeeded
        } else {
            tracing::warn!(
                instance = %alert.instance,
                probe = %alert.probe,
                command = %command_line,
                status = %output.status,
                stdout = %stdout,
                stderr = %stderr,
                "Alert action failed"
            );
            ActionOutcome::Failed {
                code: output.status.code(),
            }
        }
    }
}
