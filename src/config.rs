//! Configuration management
//!
//! Handles loading and validating demo configuration from TOML files. Every
//! section has defaults, so the demos also run without a file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the OTLP collector endpoint
pub const OTLP_ENDPOINT_ENV: &str = "OLTP_ENDPOINT";

/// Collector endpoint used when neither the file nor the environment set one
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://0.0.0.0:55680";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub prometheus: PrometheusConfig,
    pub otlp: OtlpConfig,
    pub runtime_stats: RuntimeStatsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG`
    pub level: String,
    /// Output format: "json" or "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Prometheus scrape endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Serve the scrape endpoint
    pub enabled: bool,
    /// Scrape endpoint bind address
    pub bind_addr: SocketAddr,
    /// Histogram bucket boundaries; empty renders histograms as summaries
    pub buckets: Vec<f64>,
    /// Labels added to every exported series
    pub global_labels: BTreeMap<String, String>,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: default_prometheus_addr(),
            buckets: Vec::new(),
            global_labels: BTreeMap::new(),
        }
    }
}

/// OTLP push exporter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtlpConfig {
    /// Push metrics to a collector
    pub enabled: bool,
    /// Collector endpoint (falls back to `OLTP_ENDPOINT`)
    pub endpoint: Option<String>,
    /// Seconds between two pushes
    pub export_interval_secs: u64,
    /// Export timeout in seconds
    pub timeout_secs: u64,
    /// `service.name` resource attribute
    pub service_name: String,
    /// Extra resource attributes
    pub resource_attributes: BTreeMap<String, String>,
}

impl Default for OtlpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            export_interval_secs: default_export_interval(),
            timeout_secs: default_export_timeout(),
            service_name: default_service_name(),
            resource_attributes: BTreeMap::new(),
        }
    }
}

impl OtlpConfig {
    /// Get effective collector endpoint (file, then environment, then default)
    pub fn effective_endpoint(&self) -> String {
        let raw = self
            .endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .or_else(|| std::env::var(OTLP_ENDPOINT_ENV).ok().filter(|e| !e.is_empty()))
            .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string());
        normalize_endpoint(&raw)
    }

    pub fn export_interval(&self) -> Duration {
        Duration::from_secs(self.export_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// gRPC endpoints need a scheme; bare `host:port` gets `http://`
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

/// Runtime statistics publisher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeStatsConfig {
    /// Publish runtime statistics
    pub enabled: bool,
    /// Minimum milliseconds between two stat reads
    pub min_read_interval_ms: u64,
    /// Milliseconds between two observation cycles
    pub observe_interval_ms: u64,
    /// Also publish uptime, tokio and live object metrics
    pub extra_metrics: bool,
    /// Prefix for every instrument name
    pub metric_prefix: Option<String>,
    /// Labels attached to every observation
    pub labels: BTreeMap<String, String>,
}

impl Default for RuntimeStatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_read_interval_ms: memstats::DEFAULT_MIN_READ_INTERVAL.as_millis() as u64,
            observe_interval_ms: memstats::DEFAULT_OBSERVE_INTERVAL.as_millis() as u64,
            extra_metrics: false,
            metric_prefix: None,
            labels: BTreeMap::new(),
        }
    }
}

impl RuntimeStatsConfig {
    /// Build publisher options from this section
    pub fn to_options(&self) -> memstats::Options {
        let mut options = memstats::Options::new()
            .with_minimum_read_interval(Duration::from_millis(self.min_read_interval_ms))
            .with_observe_interval(Duration::from_millis(self.observe_interval_ms))
            .with_labels(
                self.labels
                    .iter()
                    .map(|(k, v)| memstats::Label::new(k.clone(), v.clone())),
            );
        if self.extra_metrics {
            options = options.with_extra_runtime_metrics();
        }
        if let Some(prefix) = &self.metric_prefix {
            options = options.with_metric_prefix(prefix.clone());
        }
        options
    }
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_prometheus_addr() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 9090)) }
fn default_export_interval() -> u64 { 10 }
fn default_export_timeout() -> u64 { 10 }
fn default_service_name() -> String { "otel-playground".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_toml(&contents)?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use `defaults`
    pub fn load_or(path: Option<&Path>, defaults: Self) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                defaults.validate()?;
                Ok(defaults)
            }
        }
    }

    /// Parse and validate TOML contents
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            anyhow::bail!("logging.format must be \"json\" or \"pretty\"");
        }
        if self.prometheus.buckets.windows(2).any(|w| w[0] >= w[1]) {
            anyhow::bail!("prometheus.buckets must be strictly increasing");
        }
        if self.otlp.export_interval_secs == 0 {
            anyhow::bail!("otlp.export_interval_secs must be > 0");
        }
        if self.otlp.service_name.is_empty() {
            anyhow::bail!("otlp.service_name must not be empty");
        }
        if self.runtime_stats.observe_interval_ms == 0 {
            anyhow::bail!("runtime_stats.observe_interval_ms must be > 0");
        }
        Ok(())
    }
}
