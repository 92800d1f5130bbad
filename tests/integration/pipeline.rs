//! End-to-end pipeline test
//!
//! The global recorder and the runtime statistics publisher can each be
//! installed once per process, so everything lives in one test.

use std::time::Duration;

use otel_playground::demo::{self, basic_api::RequestInstruments};
use otel_playground::Telemetry;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pipeline_feeds_prometheus_and_otlp() {
    let mut config = demo::testapp_defaults();
    config.prometheus.bind_addr = "127.0.0.1:0".parse().unwrap();
    config.prometheus.buckets = demo::basic_api::LATENCY_BUCKETS.to_vec();
    // Nothing listens here; the gRPC channel connects lazily, so setup succeeds
    config.otlp.endpoint = Some("http://127.0.0.1:1".to_string());
    config.otlp.timeout_secs = 1;
    config.runtime_stats.observe_interval_ms = 20;
    config.runtime_stats.extra_metrics = true;

    let telemetry = tokio_test::assert_ok!(Telemetry::start(&config));
    let handle = telemetry.prometheus.clone().unwrap();
    assert!(telemetry.meter_provider.is_some());
    assert_eq!(telemetry.runtime_stats_reporters(), 2);

    let instruments = RequestInstruments::new();
    instruments.record(3, 2.0);
    instruments.record_bound(4, 20.0);

    tokio::time::sleep(Duration::from_millis(200)).await;

    let output = handle.render();
    assert!(output.contains("test_app_runtime_threads{app_name=\"testapp\"}"));
    assert!(output.contains("test_app_runtime_mem_resident"));
    assert!(output.contains("test_app_runtime_tokio_workers{app_name=\"testapp\"}"));
    assert!(output.contains("request_count{"));
    assert!(output.contains("request_latency_bucket{"));

    // A second pipeline cannot take over the global recorder
    assert!(Telemetry::start(&config).is_err());

    // The final push fails against the dead endpoint, but shutdown must return
    let stopped = tokio::time::timeout(Duration::from_secs(15), telemetry.shutdown()).await;
    assert!(stopped.is_ok());
}
