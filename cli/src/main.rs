//! filecap daemon entry point.
//!
//! Reads watch definitions from a TOML configuration file and enforces
//! them until terminated. SIGHUP reloads the configuration; SIGINT and
//! SIGTERM shut the daemon down cleanly.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use filecap_core::Supervisor;

mod config;

/// Keep the number of files in watched directories below configured
/// limits by deleting the oldest matching files.
#[derive(Debug, Parser)]
#[command(name = "filecap", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "/etc/filecap.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let specs = config::load(&args.config)?;
    let mut supervisor = Supervisor::new()?;
    let active = supervisor.apply(specs).await;
    if active == 0 {
        bail!("no usable watch sections in {}", args.config.display());
    }
    info!(watches = active, "filecap started");

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = terminate.recv() => break,
            _ = hangup.recv() => {
                info!(config = %args.config.display(), "reloading configuration");
                match config::load(&args.config) {
                    Ok(specs) => {
                        let active = supervisor.apply(specs).await;
                        info!(watches = active, "configuration reloaded");
                    }
                    Err(err) => {
                        error!(error = %err, "reload failed, keeping current watches");
                    }
                }
            }
        }
    }

    info!("shutting down");
    supervisor.shutdown().await;
    Ok(())
}
