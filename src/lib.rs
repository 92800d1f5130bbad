//! otel-playground - metrics pipeline demos
//!
//! Example programs recording application metrics through the `metrics`
//! facade and the OpenTelemetry SDK, exported for Prometheus scraping and
//! pushed over OTLP, with process runtime statistics from [`memstats`].

pub mod config;
pub mod demo;
pub mod telemetry;
pub mod util;

pub use config::Config;
pub use telemetry::Telemetry;

/// Version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
