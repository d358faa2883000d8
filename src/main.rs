//! Cluster Container Supervisor
//!
//! Application-master-style daemon that requests worker containers from a
//! resource manager, launches them via a node manager, and keeps a fleet at
//! a configured size across container churn.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod cmd;

#[derive(Parser)]
#[command(name = "cluster-supervisor")]
#[command(about = "Cluster container supervisor (application master)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<cmd::Commands>,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cluster_supervisor={log_level}").into()),
        )
        .init();

    info!("Starting cluster container supervisor v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd::Commands::Diagnostics) => {
            cmd::diagnostics::run().await?;
        }
        None => {
            if let Err(e) = cmd::root::run(&cli.config).await {
                error!("supervisor error: {e}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
