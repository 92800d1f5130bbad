//! Log output for the demo binaries

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Caps for the crates on the OTLP export path; their per-connection
/// logging would otherwise flood a debug session.
const EXPORT_PATH_DIRECTIVES: &[&str] = &[
    "h2=warn",
    "hyper=warn",
    "hyper_util=warn",
    "tower=warn",
    "tonic=warn",
    "opentelemetry_sdk=warn",
    "opentelemetry_otlp=warn",
];

/// Install the global subscriber: `RUST_LOG` wins over `logging.level`
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&config.level, rust_log.as_deref())?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().compact().with_target(false))
            .try_init()?;
    }

    Ok(())
}

/// Filter from `RUST_LOG` when set, else the level plus export-path caps
fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|d| !d.is_empty()) {
        return EnvFilter::try_new(directives)
            .with_context(|| format!("invalid RUST_LOG {directives:?}"));
    }

    let mut directives = vec![level];
    directives.extend_from_slice(EXPORT_PATH_DIRECTIVES);
    EnvFilter::try_new(directives.join(","))
        .with_context(|| format!("invalid logging.level {level:?}"))
}
