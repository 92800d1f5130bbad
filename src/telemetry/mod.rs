//! Metrics pipelines
//!
//! - `prometheus`: pull exporter behind the `metrics` facade
//! - `otlp`: push exporter through the OpenTelemetry SDK
//!
//! [`Telemetry`] wires whichever of the two are enabled and feeds runtime
//! statistics into both from a single sample.

pub mod otlp;
pub mod prometheus;

pub use otlp::OtelReporter;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing::{info, warn};

use crate::config::Config;
use memstats::{Fanout, MetricsReporter};

/// Running exporters and the runtime statistics publisher
pub struct Telemetry {
    pub prometheus: Option<PrometheusHandle>,
    pub meter_provider: Option<SdkMeterProvider>,
    runtime_stats: Option<memstats::Handle>,
    runtime_stats_reporters: usize,
}

impl Telemetry {
    /// Install the enabled exporters, then start runtime statistics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        let prometheus = if config.prometheus.enabled {
            Some(prometheus::install(&config.prometheus)?)
        } else {
            None
        };

        let meter_provider = if config.otlp.enabled {
            Some(otlp::init(&config.otlp)?)
        } else {
            None
        };

        let mut runtime_stats_reporters = 0;
        let runtime_stats = if config.runtime_stats.enabled {
            let mut fanout = Fanout::new();
            if prometheus.is_some() {
                fanout = fanout.with(MetricsReporter);
            }
            if let Some(provider) = &meter_provider {
                fanout = fanout.with(OtelReporter::from_provider(provider));
            }

            if fanout.is_empty() {
                warn!("Runtime statistics enabled but no exporter is; skipping");
                None
            } else {
                runtime_stats_reporters = fanout.len();
                info!(reporters = runtime_stats_reporters, "Publishing runtime statistics");
                let handle = memstats::start(config.runtime_stats.to_options(), fanout)
                    .context("Failed to start runtime statistics")?;
                Some(handle)
            }
        } else {
            None
        };

        Ok(Self {
            prometheus,
            meter_provider,
            runtime_stats,
            runtime_stats_reporters,
        })
    }

    /// Number of exporters fed from each runtime statistics sample
    pub fn runtime_stats_reporters(&self) -> usize {
        self.runtime_stats_reporters
    }

    /// Stop sampling and flush the push exporter
    pub async fn shutdown(self) -> Result<()> {
        if let Some(handle) = self.runtime_stats {
            handle.shutdown().await;
        }

        if let Some(provider) = self.meter_provider {
            // Final export runs on the blocking pool; it waits for the collector.
            tokio::task::spawn_blocking(move || provider.shutdown())
                .await
                .context("Meter provider shutdown panicked")?
                .context("Failed to flush meter provider")?;
        }

        info!("Telemetry stopped");
        Ok(())
    }
}
