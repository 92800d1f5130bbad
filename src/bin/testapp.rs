//! Test app
//!
//! Pushes runtime statistics to an OTLP collector and serves the same
//! sample for Prometheus scraping until interrupted.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use otel_playground::{demo, util, Config, Telemetry, VERSION};

#[derive(Parser)]
#[command(version, about = "Runtime statistics over OTLP and Prometheus")]
struct Args {
    /// TOML config file replacing the demo defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load_or(args.config.as_deref(), demo::testapp_defaults())?;
    util::init_tracing(&config.logging)?;

    info!(version = VERSION, "Starting local example");

    let telemetry = Telemetry::start(&config)?;

    util::shutdown_signal().await;
    info!("Shutdown signal received, flushing metrics");

    telemetry.shutdown().await
}
