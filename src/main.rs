//! lux-uploader - LUX identifier batch upload tool
//!
//! Reconciles a CSV of (entity id, LUX URI) pairs against Wikidata by
//! creating external-identifier claims through a bounded pool of concurrent
//! workers, backing off globally when the server reports replication lag.

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lux_uploader::config::{Args, Config};

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    info!("Starting lux-uploader");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::resolve(args)?;
    let stats = lux_uploader::scheduler::run(config).await?;

    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        redirected = stats.redirected,
        skipped = stats.skipped,
        "lux-uploader finished"
    );

    Ok(())
}
