//! Publisher options

use std::time::Duration;

use crate::error::{Error, Result};
use crate::reporter::Label;

/// Default minimum time between two snapshot refreshes
pub const DEFAULT_MIN_READ_INTERVAL: Duration = Duration::from_secs(15);

/// Default length of one observation cycle
pub const DEFAULT_OBSERVE_INTERVAL: Duration = Duration::from_secs(10);

/// Settings for the runtime stats publisher
#[derive(Debug, Clone)]
pub struct Options {
    /// Minimum time between two reads of the stats source. Zero reads on
    /// every cycle.
    pub min_read_interval: Duration,
    /// How often the background task observes.
    pub observe_interval: Duration,
    /// Also publish uptime, tokio runtime metrics and live objects.
    pub extra_runtime_metrics: bool,
    /// Attached to every observation.
    pub labels: Vec<Label>,
    /// Prepended to every instrument name, separated by a dot.
    pub metric_prefix: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            min_read_interval: DEFAULT_MIN_READ_INTERVAL,
            observe_interval: DEFAULT_OBSERVE_INTERVAL,
            extra_runtime_metrics: false,
            labels: Vec::new(),
            metric_prefix: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_minimum_read_interval(mut self, interval: Duration) -> Self {
        self.min_read_interval = interval;
        self
    }

    #[must_use]
    pub fn with_observe_interval(mut self, interval: Duration) -> Self {
        self.observe_interval = interval;
        self
    }

    #[must_use]
    pub fn with_extra_runtime_metrics(mut self) -> Self {
        self.extra_runtime_metrics = true;
        self
    }

    #[must_use]
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = Label>) -> Self {
        self.labels = labels.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_metric_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metric_prefix = Some(prefix.into());
        self
    }

    /// Full instrument name for a base name
    pub(crate) fn metric_name(&self, base: &str) -> String {
        match &self.metric_prefix {
            Some(prefix) => format!("{prefix}.{base}"),
            None => base.to_string(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.metric_prefix {
            let mut chars = prefix.chars();
            let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
            let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            if !starts_with_letter || !rest_valid {
                return Err(Error::InvalidPrefix(prefix.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert_eq!(opts.min_read_interval, Duration::from_secs(15));
        assert!(!opts.extra_runtime_metrics);
        assert!(opts.labels.is_empty());
        assert_eq!(opts.metric_name("runtime.threads"), "runtime.threads");
    }

    #[test]
    fn test_prefix() {
        let opts = Options::new().with_metric_prefix("test_app");
        assert!(opts.validate().is_ok());
        assert_eq!(opts.metric_name("runtime.threads"), "test_app.runtime.threads");
    }

    #[test]
    fn test_invalid_prefix() {
        for bad in ["", "1app", "my-app", "app name"] {
            let opts = Options::new().with_metric_prefix(bad);
            assert!(
                matches!(opts.validate(), Err(Error::InvalidPrefix(_))),
                "prefix {bad:?} should be rejected"
            );
        }
    }
}
