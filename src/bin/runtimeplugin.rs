//! Runtime statistics demo
//!
//! Publishes process runtime statistics next to an observed gauge, a
//! histogram and a counter driven by a short scripted sequence.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use otel_playground::demo::{self, runtime_plugin};
use otel_playground::{util, Config, Telemetry, VERSION};

#[derive(Parser)]
#[command(version, about = "Runtime statistics and batch recording demo")]
struct Args {
    /// TOML config file replacing the demo defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load_or(args.config.as_deref(), demo::runtime_plugin_defaults())?;
    util::init_tracing(&config.logging)?;

    info!(version = VERSION, "Starting runtime plugin demo");

    let telemetry = Telemetry::start(&config)?;
    runtime_plugin::describe();

    let observed = Arc::new(runtime_plugin::ObservedValue::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let observer = tokio::spawn(runtime_plugin::run_observer(
        observed.clone(),
        runtime_plugin::OBSERVE_PERIOD,
        shutdown_rx,
    ));

    tokio::select! {
        _ = runtime_plugin::run_script(&observed, runtime_plugin::STEP_PAUSE) => {
            info!(bind_addr = %config.prometheus.bind_addr, "Please visit /metrics");
            util::shutdown_signal().await;
        }
        _ = util::shutdown_signal() => {}
    }
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    observer.await?;
    telemetry.shutdown().await
}
