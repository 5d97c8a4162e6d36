//! Monitor registry
//!
//! Owns one [`MonitorInstance`] per configured database and runs every
//! probe against every instance in its own task. All instances share one
//! channel registry; each keeps its own rate-limit state.

pub mod instance;

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{Config, ConfigError, ProbeSpec};
use crate::notify::{ChannelRegistry, Dispatcher, NotifierError};
use crate::probe::{PgProbeExecutor, ProbeExecutor};

pub use instance::{AlertOutcome, MonitorInstance};

/// Startup errors; anything after startup is logged, not returned
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to instance {instance}: {source}")]
    Connect {
        instance: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Notification setup failed: {0}")]
    Notifier(#[from] NotifierError),

    #[error("Signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

pub struct Monitor {
    instances: Vec<Arc<MonitorInstance>>,
    probes: Vec<ProbeSpec>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Validate the config and connect to every database. Any connection
    /// failure aborts startup.
    pub async fn connect(config: Config) -> Result<Self, MonitorError> {
        config.validate()?;
        let registry = ChannelRegistry::from_config(&config.alerts)?;

        let mut targets: Vec<(String, Arc<dyn ProbeExecutor>)> =
            Vec::with_capacity(config.databases.len());
        for db in &config.databases {
            let instance = db.instance_name().to_string();
            tracing::info!(
                instance = %instance,
                host = %db.host,
                port = db.port,
                database = %db.database,
                "Connecting to database"
            );

            match PgProbeExecutor::connect(db).await {
                Ok(executor) => {
                    let executor: Arc<dyn ProbeExecutor> = Arc::new(executor);
                    targets.push((instance, executor));
                }
                Err(source) => {
                    for (_, executor) in &targets {
                        executor.close().await;
                    }
                    return Err(MonitorError::Connect { instance, source });
                }
            }
        }

        Ok(Self::from_parts(targets, config.queries, registry))
    }

    /// Build from executors that are already connected
    pub fn from_parts(
        targets: Vec<(String, Arc<dyn ProbeExecutor>)>,
        probes: Vec<ProbeSpec>,
        registry: ChannelRegistry,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(registry));
        let instances = targets
            .into_iter()
            .map(|(name, executor)| Arc::new(MonitorInstance::new(name, executor, dispatcher.clone())))
            .collect();
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            instances,
            probes,
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    pub fn instances(&self) -> &[Arc<MonitorInstance>] {
        &self.instances
    }

    pub fn instance(&self, name: &str) -> Option<&Arc<MonitorInstance>> {
        self.instances.iter().find(|i| i.name() == name)
    }

    /// Number of running probe tasks
    pub fn task_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Spawn one task per (instance, probe)
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }

        for instance in &self.instances {
            for probe in &self.probes {
                let handle = instance.spawn(probe.clone(), self.shutdown_tx.subscribe());
                self.tasks.push(handle);
            }
        }

        tracing::info!(
            instances = self.instances.len(),
            probes = self.probes.len(),
            tasks = self.tasks.len(),
            "Monitor started"
        );
    }

    /// Signal every probe task to stop and wait for them
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);

        for result in join_all(self.tasks.drain(..)).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Probe task ended abnormally");
            }
        }
        tracing::info!("All probe tasks stopped");
    }

    /// Close every instance's connections
    pub async fn close(&self) {
        join_all(self.instances.iter().map(|i| i.executor().close())).await;
    }

    /// Start, wait for SIGINT or SIGTERM, then stop and close
    pub async fn run(mut self) -> Result<(), MonitorError> {
        self.start();

        let signal = wait_for_signal().await;
        match &signal {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }

        self.shutdown().await;
        self.close().await;
        signal.map_err(MonitorError::from)
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("instances", &self.instances)
            .field("probes", &self.probes.len())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
