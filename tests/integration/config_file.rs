//! Config file loading tests

use std::path::PathBuf;
use std::time::Duration;

use otel_playground::Config;

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("otel-playground-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

/// The shipped example config must stay loadable
#[test]
fn test_example_config_parses() {
    let config = Config::from_toml(include_str!("../../config.example.toml")).unwrap();

    assert_eq!(config.prometheus.bind_addr.port(), 17000);
    assert_eq!(config.prometheus.global_labels["env"], "dev");
    assert_eq!(config.otlp.effective_endpoint(), "http://localhost:4317");
    assert_eq!(config.otlp.export_interval(), Duration::from_secs(2));

    let options = config.runtime_stats.to_options();
    assert!(options.extra_runtime_metrics);
    assert_eq!(options.metric_prefix.as_deref(), Some("test_app"));
}

#[test]
fn test_load_from_file_replaces_defaults() {
    let path = write_temp("partial.toml", "[prometheus]\nbind_addr = \"127.0.0.1:9999\"\n");

    let defaults = otel_playground::demo::testapp_defaults();
    let config = Config::load_or(Some(&path), defaults).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.prometheus.bind_addr.port(), 9999);
    // File values replace the demo defaults wholesale
    assert!(!config.otlp.enabled);
}

#[test]
fn test_invalid_file_is_rejected() {
    let path = write_temp("invalid.toml", "[runtime_stats]\nmetric_prefix = 5\n");
    let result = Config::load(&path);
    std::fs::remove_file(&path).ok();

    assert!(result.is_err());
}
