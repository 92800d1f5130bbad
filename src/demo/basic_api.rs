//! Request counter and latency histogram
//!
//! Records the same synthetic traffic twice: once through handles bound to
//! a fixed label set, once building labels on every call.

use std::time::Duration;

use metrics::{Counter, Histogram, Unit};
use rand::Rng;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

pub const REQUEST_COUNT: &str = "request.count";
pub const REQUEST_LATENCY: &str = "request.latency";

/// Histogram boundaries for request latencies, in milliseconds
pub const LATENCY_BUCKETS: [f64; 5] = [1.0, 5.0, 10.0, 50.0, 100.0];

/// Pause between two synthetic requests
pub const LOAD_PERIOD: Duration = Duration::from_millis(100);

/// Request instruments, with handles bound once to the "remote" label set
#[derive(Clone)]
pub struct RequestInstruments {
    requests_bound: Counter,
    latency_bound: Histogram,
}

impl RequestInstruments {
    /// Describe both instruments and bind the remote handles
    ///
    /// Call after the global recorder is installed; handles bound earlier
    /// record into a no-op.
    pub fn new() -> Self {
        metrics::describe_counter!(REQUEST_COUNT, Unit::Count, "number of requests received");
        metrics::describe_histogram!(REQUEST_LATENCY, Unit::Milliseconds, "request latencies");

        Self {
            requests_bound: metrics::counter!(
                REQUEST_COUNT,
                "path" => "/api/list/other",
                "host" => "remote"
            ),
            latency_bound: metrics::histogram!(
                REQUEST_LATENCY,
                "path" => "/api/list/other",
                "host" => "remote"
            ),
        }
    }

    /// Record with labels created per call
    pub fn record(&self, count: u64, latency_ms: f64) {
        let labels = [("path", "/api/list/foo"), ("host", "localhost")];
        metrics::counter!(REQUEST_COUNT, &labels).increment(count);
        metrics::histogram!(REQUEST_LATENCY, &labels).record(latency_ms);
    }

    /// Record through the pre-bound handles
    pub fn record_bound(&self, count: u64, latency_ms: f64) {
        self.requests_bound.increment(count);
        self.latency_bound.record(latency_ms);
    }
}

impl Default for RequestInstruments {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate synthetic traffic until `shutdown_rx` flips
pub async fn run_load(instruments: RequestInstruments, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(LOAD_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let (count, latency) = {
                    let mut rng = rand::thread_rng();
                    (rng.gen_range(0..100u64), rng.gen_range(0.0..10.0))
                };
                instruments.record(count, latency);
                instruments.record_bound(count, latency);
            }
            Ok(()) = shutdown_rx.changed() => {
                debug!("Load generator stopping");
                break;
            }
        }
    }
}
