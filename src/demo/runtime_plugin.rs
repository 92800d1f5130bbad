//! Runtime statistics next to a scripted set of application instruments
//!
//! An observed gauge is republished from a shared value on every cycle,
//! while a histogram and a counter are recorded in batches that share one
//! label set.

use std::sync::Arc;
use std::time::Duration;

use metrics::Label;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub const OBSERVED: &str = "ex.com.one";
pub const RECORDED: &str = "ex.com.two";
pub const COUNTED: &str = "ex.com.three";

pub const LEMONS_KEY: &str = "ex.com/lemons";

/// Pause between two scripted steps
pub const STEP_PAUSE: Duration = Duration::from_secs(5);

/// How often the observed value is republished
pub const OBSERVE_PERIOD: Duration = Duration::from_secs(1);

pub fn common_labels() -> Vec<Label> {
    vec![
        Label::new(LEMONS_KEY, "10"),
        Label::new("A", "1"),
        Label::new("B", "2"),
        Label::new("C", "3"),
    ]
}

pub fn not_so_common_labels() -> Vec<Label> {
    vec![Label::new(LEMONS_KEY, "13")]
}

pub fn describe() {
    metrics::describe_gauge!(OBSERVED, "A ValueObserver set to a value");
    metrics::describe_histogram!(RECORDED, "A value recorder fed in batches");
    metrics::describe_counter!(COUNTED, "A counter fed in batches");
}

/// Value read by the observer on every cycle
#[derive(Debug, Default)]
pub struct ObservedValue {
    inner: RwLock<(f64, Vec<Label>)>,
}

impl ObservedValue {
    pub fn set(&self, value: f64, labels: Vec<Label>) {
        *self.inner.write() = (value, labels);
    }

    pub fn get(&self) -> (f64, Vec<Label>) {
        self.inner.read().clone()
    }

    /// Publish the current value under its current labels
    pub fn publish(&self) {
        let (value, labels) = self.get();
        metrics::gauge!(OBSERVED, labels).set(value);
    }
}

/// Record one measurement on each batch instrument under the same labels
pub fn record_batch(labels: &[Label], recorded: f64, counted: u64) {
    metrics::histogram!(RECORDED, labels.to_vec()).record(recorded);
    metrics::counter!(COUNTED, labels.to_vec()).increment(counted);
}

/// One step of the scripted sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub observed: f64,
    pub recorded: f64,
    pub counted: u64,
    pub labels: Vec<Label>,
}

impl Step {
    pub fn apply(&self, observed: &ObservedValue) {
        observed.set(self.observed, self.labels.clone());
        record_batch(&self.labels, self.recorded, self.counted);
    }
}

pub fn script() -> Vec<Step> {
    vec![
        Step { observed: 1.0, recorded: 2.0, counted: 12, labels: common_labels() },
        Step { observed: 1.0, recorded: 2.0, counted: 22, labels: not_so_common_labels() },
        Step { observed: 13.0, recorded: 12.0, counted: 13, labels: common_labels() },
    ]
}

/// Apply every step, sleeping `pause` between two steps
pub async fn run_script(observed: &ObservedValue, pause: Duration) {
    let steps = script();
    let last = steps.len().saturating_sub(1);

    for (i, step) in steps.iter().enumerate() {
        step.apply(observed);
        debug!(step = i, observed = step.observed, "Applied scripted step");
        if i < last {
            tokio::time::sleep(pause).await;
        }
    }

    info!("Example finished updating");
}

/// Republish the observed value every `period` until `shutdown_rx` flips
pub async fn run_observer(
    observed: Arc<ObservedValue>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => observed.publish(),
            Ok(()) = shutdown_rx.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use metrics_exporter_prometheus::PrometheusBuilder;

    use super::*;

    #[test]
    fn test_script_values() {
        let steps = script();
        let observed: Vec<f64> = steps.iter().map(|s| s.observed).collect();
        let recorded: Vec<f64> = steps.iter().map(|s| s.recorded).collect();
        let counted: Vec<u64> = steps.iter().map(|s| s.counted).collect();

        assert_eq!(observed, vec![1.0, 1.0, 13.0]);
        assert_eq!(recorded, vec![2.0, 2.0, 12.0]);
        assert_eq!(counted, vec![12, 22, 13]);
        assert_eq!(steps[1].labels, not_so_common_labels());
    }

    #[test]
    fn test_observed_value_is_replaced() {
        let value = ObservedValue::default();
        assert_eq!(value.get(), (0.0, Vec::new()));

        value.set(13.0, not_so_common_labels());
        assert_eq!(value.get(), (13.0, not_so_common_labels()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_renders() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        describe();
        let observed = ObservedValue::default();
        run_script(&observed, STEP_PAUSE).await;
        observed.publish();

        let output = handle.render();
        let counter_line = |needle: &str| {
            output
                .lines()
                .find(|l| l.starts_with("ex_com_three{") && l.contains(needle))
                .and_then(|l| l.rsplit(' ').next())
                .and_then(|v| v.parse::<f64>().ok())
        };
        assert_eq!(counter_line(r#"A="1""#), Some(25.0));
        assert_eq!(counter_line(r#"ex_com_lemons="13""#), Some(22.0));

        let gauge = output
            .lines()
            .find(|l| l.starts_with("ex_com_one{"))
            .and_then(|l| l.rsplit(' ').next())
            .and_then(|v| v.parse::<f64>().ok());
        assert_eq!(gauge, Some(13.0));
    }
}
