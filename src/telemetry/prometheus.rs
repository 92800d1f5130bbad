//! Prometheus metrics exporter
//!
//! HTTP endpoint for Prometheus scraping.

use anyhow::{anyhow, Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{error, info};

use crate::config::PrometheusConfig;

/// Build the Prometheus builder described by `config`, without installing it
pub fn builder(config: &PrometheusConfig) -> Result<PrometheusBuilder> {
    let mut builder = PrometheusBuilder::new().with_http_listener(config.bind_addr);

    if !config.buckets.is_empty() {
        builder = builder
            .set_buckets(&config.buckets)
            .context("Invalid histogram buckets")?;
    }

    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    Ok(builder)
}

/// Install the global recorder and serve it for scraping
///
/// Must be called from within a tokio runtime: the scrape listener is
/// bound immediately and served on a background task.
pub fn install(config: &PrometheusConfig) -> Result<PrometheusHandle> {
    let (recorder, exporter) = builder(config)?
        .build()
        .with_context(|| format!("Failed to bind Prometheus listener on {}", config.bind_addr))?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|_| anyhow!("a global metrics recorder is already installed"))?;

    tokio::spawn(async move {
        if let Err(e) = exporter.await {
            error!(error = ?e, "Prometheus exporter stopped");
        }
    });

    info!(bind_addr = %config.bind_addr, "Prometheus server running");
    Ok(handle)
}
