//! Demo programs
//!
//! Each binary under `src/bin` runs one of these with its own defaults;
//! a config file given with `--config` replaces them.

pub mod basic_api;
pub mod runtime_plugin;

use std::net::SocketAddr;

use crate::config::Config;

/// Scrape port of the test app
pub const TESTAPP_PROMETHEUS_PORT: u16 = 17000;

/// Request demo: Prometheus on `:9090` with latency buckets, no runtime stats
pub fn basic_api_defaults() -> Config {
    let mut config = Config::default();
    config.prometheus.buckets = basic_api::LATENCY_BUCKETS.to_vec();
    config.runtime_stats.enabled = false;
    config
}

/// Runtime plugin demo: Prometheus on `:9090`, stats read at most once a second
pub fn runtime_plugin_defaults() -> Config {
    let mut config = Config::default();
    config.runtime_stats.min_read_interval_ms = 1000;
    config.runtime_stats.observe_interval_ms = 1000;
    config
}

/// Test app: OTLP push every 2 s plus a scrape endpoint on `:17000`
pub fn testapp_defaults() -> Config {
    let mut config = Config::default();

    config.prometheus.bind_addr = SocketAddr::from(([0, 0, 0, 0], TESTAPP_PROMETHEUS_PORT));

    config.otlp.enabled = true;
    config.otlp.export_interval_secs = 2;
    config.otlp.service_name = "testapp".to_string();
    config
        .otlp
        .resource_attributes
        .insert("name".to_string(), "stavros".to_string());

    // One fresh sample per push; the 1 s read throttle never skips a cycle.
    config.runtime_stats.min_read_interval_ms = 1000;
    config.runtime_stats.observe_interval_ms = config.otlp.export_interval_secs * 1000;
    config.runtime_stats.metric_prefix = Some("test_app".to_string());
    config
        .runtime_stats
        .labels
        .insert("app_name".to_string(), "testapp".to_string());
    config
}
