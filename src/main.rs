//! pgalert
//!
//! Run with: cargo run -- config.yaml
//!
//! Environment variables:
//! - RUST_LOG: Log filter (default: pgalert=info)

use clap::Parser;
use pgalert::config::Config;
use pgalert::monitor::Monitor;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pgalert", version, about = "PostgreSQL probe monitor and alerter")]
struct Cli {
    /// Path to the YAML configuration file
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Config first: it names the log file
    let config = Config::load(&cli.config)?;
    pgalert::logging::init(config.logging.file_path.as_deref())?;

    println!(
        r#"
                  _           _
  _ __   __ _  __ _| | ___ _ __| |_
 | '_ \ / _` |/ _` | |/ _ \ '__| __|
 | |_) | (_| | (_| | |  __/ |  | |_
 | .__/ \__, |\__,_|_|\___|_|   \__|
 |_|    |___/

 PostgreSQL Probe Monitor
 Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );

    tracing::info!("pgalert configuration:");
    tracing::info!("  Config file: {}", cli.config.display());
    tracing::info!("  Databases: {}", config.databases.len());
    for db in &config.databases {
        tracing::info!("    - {} @ {}:{}/{}", db.instance_name(), db.host, db.port, db.database);
    }
    tracing::info!("  Queries: {}", config.queries.len());
    for probe in &config.queries {
        tracing::info!(
            "    - {} every {} ({} rules)",
            probe.name,
            pgalert::config::duration::format_duration(probe.interval),
            probe.alert_rules.len()
        );
    }
    if let Some(path) = &config.logging.file_path {
        tracing::info!("  Log file: {}", path.display());
    }

    let monitor = Monitor::connect(config).await?;
    monitor.run().await?;

    tracing::info!("pgalert stopped");
    Ok(())
}
