//! Request metrics demo
//!
//! Records synthetic request counts and latencies, bound and unbound, and
//! serves them for Prometheus scraping.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use otel_playground::demo::{self, basic_api};
use otel_playground::{util, Config, Telemetry, VERSION};

#[derive(Parser)]
#[command(version, about = "Request counter and latency histogram demo")]
struct Args {
    /// TOML config file replacing the demo defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load_or(args.config.as_deref(), demo::basic_api_defaults())?;
    util::init_tracing(&config.logging)?;

    info!(version = VERSION, "Starting basic API demo");

    let telemetry = Telemetry::start(&config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let load = tokio::spawn(basic_api::run_load(
        basic_api::RequestInstruments::new(),
        shutdown_rx,
    ));

    info!(bind_addr = %config.prometheus.bind_addr, "Example updating, please visit /metrics");

    util::shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    load.await?;
    telemetry.shutdown().await
}
