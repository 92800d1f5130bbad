//! Sampled metrics publisher
//!
//! Once per observation cycle the publisher decides whether the cached
//! snapshot is old enough to refresh, then reports every instrument from
//! that one snapshot. Refresh and fan-out share a single lock, so two
//! concurrent cycles never mix values from different samples.

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::instruments::{Extra, Field, BASE, LIVE_OBJECTS};
use crate::reporter::{Descriptor, Reporter, Value, ValueType};
use crate::snapshot::Snapshot;
use crate::source::{ProcessStats, StatsSource};

static STARTED: OnceCell<()> = OnceCell::new();

/// Start publishing statistics of the current process.
///
/// Builds a [`Publisher`] over [`ProcessStats`], registers its instruments
/// with `reporter` and spawns the observation task on the current tokio
/// runtime. Only one publisher may be started per process; a call that
/// fails leaves the slot free for the next one.
pub fn start<R>(options: Options, reporter: R) -> Result<Handle>
where
    R: Reporter + 'static,
{
    let mut handle = None;

    // Concurrent callers block here until the first one settles.
    STARTED.get_or_try_init(|| -> Result<()> {
        tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let publisher = Publisher::new(options, ProcessStats::new())?;
        publisher.register(&reporter)?;
        handle = Some(Arc::new(publisher).spawn(reporter)?);
        Ok(())
    })?;

    handle.ok_or(Error::AlreadyStarted)
}

/// One instrument bound to its full name
struct Instrument {
    descriptor: Descriptor,
    read: fn(&Snapshot) -> Value,
}

impl Instrument {
    fn from_field(field: &Field, options: &Options) -> Self {
        Self {
            descriptor: Descriptor {
                name: options.metric_name(field.name),
                description: field.description,
                unit: field.unit,
                kind: field.kind,
                value_type: field.value_type,
            },
            read: field.read,
        }
    }
}

/// Cache guarded by the publisher lock
struct SampleState<S> {
    source: S,
    last_read: Option<Instant>,
    snapshot: Option<Snapshot>,
    reads: u64,
}

/// Throttled snapshot cache with fan-out to a [`Reporter`]
pub struct Publisher<S> {
    options: Options,
    base: Vec<Instrument>,
    live_objects: Option<Instrument>,
    extras: Vec<(Extra, Descriptor)>,
    created: Instant,
    state: Mutex<SampleState<S>>,
}

impl<S: StatsSource> Publisher<S> {
    pub fn new(options: Options, source: S) -> Result<Self> {
        options.validate()?;

        let base = BASE
            .iter()
            .map(|field| Instrument::from_field(field, &options))
            .collect();

        let (live_objects, extras) = if options.extra_runtime_metrics {
            let extras = Extra::ALL
                .iter()
                .map(|&extra| {
                    let descriptor = Descriptor {
                        name: options.metric_name(extra.name()),
                        description: extra.description(),
                        unit: extra.unit(),
                        kind: extra.kind(),
                        value_type: ValueType::Int,
                    };
                    (extra, descriptor)
                })
                .collect();
            (Some(Instrument::from_field(&LIVE_OBJECTS, &options)), extras)
        } else {
            (None, Vec::new())
        };

        Ok(Self {
            options,
            base,
            live_objects,
            extras,
            created: Instant::now(),
            state: Mutex::new(SampleState {
                source,
                last_read: None,
                snapshot: None,
                reads: 0,
            }),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Every instrument this publisher reports, in emission order
    pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
        self.base
            .iter()
            .chain(self.live_objects.iter())
            .map(|i| &i.descriptor)
            .chain(self.extras.iter().map(|(_, d)| d))
    }

    /// Number of successful source reads so far
    pub fn reads(&self) -> u64 {
        self.state.lock().reads
    }

    /// Describe every instrument to `reporter`. Stops at the first error.
    pub fn register<R: Reporter + ?Sized>(&self, reporter: &R) -> Result<()> {
        // Held so no observation can run against a half-registered reporter.
        let _state = self.state.lock();
        for descriptor in self.descriptors() {
            reporter.describe(descriptor)?;
        }
        Ok(())
    }

    /// Run one observation cycle now
    pub fn observe<R: Reporter + ?Sized>(&self, reporter: &R) -> bool {
        self.observe_at(Instant::now(), reporter)
    }

    /// Run one observation cycle as of `now`.
    ///
    /// Returns whether the source was read during this cycle.
    pub fn observe_at<R: Reporter + ?Sized>(&self, now: Instant, reporter: &R) -> bool {
        let mut state = self.state.lock();

        let due = match state.last_read {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.options.min_read_interval,
        };

        let mut refreshed = false;
        if due {
            match state.source.read() {
                Ok(snapshot) => {
                    state.snapshot = Some(snapshot);
                    state.last_read = Some(now);
                    state.reads += 1;
                    refreshed = true;
                    debug!(reads = state.reads, "Runtime stats refreshed");
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read runtime stats, reporting cached sample");
                }
            }
        }

        let Some(snapshot) = state.snapshot.as_ref() else {
            return refreshed;
        };

        let labels = &self.options.labels;
        for instrument in &self.base {
            reporter.report(&instrument.descriptor, (instrument.read)(snapshot), labels);
        }
        if let Some(instrument) = &self.live_objects {
            reporter.report(&instrument.descriptor, (instrument.read)(snapshot), labels);
        }
        for (extra, descriptor) in &self.extras {
            if let Some(value) = self.sample_extra(*extra, now) {
                reporter.report(descriptor, value, labels);
            }
        }

        refreshed
    }

    fn sample_extra(&self, extra: Extra, now: Instant) -> Option<Value> {
        match extra {
            Extra::Uptime => {
                let uptime = now.saturating_duration_since(self.created);
                Some(Value::from_u64(uptime.as_millis() as u64))
            }
            Extra::TokioWorkers => tokio_metric(|m| m.num_workers()),
            Extra::TokioAliveTasks => tokio_metric(|m| m.num_alive_tasks()),
            Extra::TokioGlobalQueueDepth => tokio_metric(|m| m.global_queue_depth()),
        }
    }

    /// Spawn the observation loop on the current tokio runtime.
    ///
    /// Dropping the returned [`Handle`] detaches the task; it then runs for
    /// the life of the runtime.
    pub fn spawn<R>(self: Arc<Self>, reporter: R) -> Result<Handle>
    where
        R: Reporter + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        // tokio::time::interval panics on a zero period
        let period = self.options.observe_interval.max(Duration::from_millis(1));

        info!(
            instruments = self.descriptors().count(),
            observe_interval_ms = period.as_millis() as u64,
            min_read_interval_ms = self.options.min_read_interval.as_millis() as u64,
            "Runtime stats publisher started"
        );

        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.observe(&reporter);
                    }
                    Ok(()) = shutdown_rx.changed() => break,
                }
            }

            debug!(reads = self.reads(), "Runtime stats publisher stopped");
        });

        Ok(Handle { shutdown_tx, task })
    }
}

fn tokio_metric(read: impl FnOnce(&tokio::runtime::RuntimeMetrics) -> usize) -> Option<Value> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    Some(Value::from_u64(read(&handle.metrics()) as u64))
}

/// Control handle for a running publisher task
pub struct Handle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Handle {
    /// Stop the observation loop and wait for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::alloc::AllocSnapshot;
    use crate::reporter::testing::RecordingReporter;
    use crate::reporter::Label;

    /// Source that counts reads and stamps the read number into the sample
    struct CountingSource {
        reads: Arc<AtomicU64>,
        fail: Arc<parking_lot::Mutex<bool>>,
    }

    impl CountingSource {
        fn new() -> (Self, Arc<AtomicU64>, Arc<parking_lot::Mutex<bool>>) {
            let reads = Arc::new(AtomicU64::new(0));
            let fail = Arc::new(parking_lot::Mutex::new(false));
            (
                Self {
                    reads: reads.clone(),
                    fail: fail.clone(),
                },
                reads,
                fail,
            )
        }
    }

    impl StatsSource for CountingSource {
        fn read(&mut self) -> Result<Snapshot> {
            if *self.fail.lock() {
                return Err(Error::Parse {
                    path: "/proc/self/statm",
                    reason: "injected".to_string(),
                });
            }
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Snapshot {
                threads: n,
                alloc: AllocSnapshot {
                    allocs: 10 * n,
                    frees: 4 * n,
                    ..AllocSnapshot::default()
                },
                ..Snapshot::default()
            })
        }
    }

    fn threads(reporter: &RecordingReporter) -> Option<Value> {
        reporter.value_of("runtime.threads")
    }

    #[test]
    fn test_first_cycle_always_reads() {
        let (source, reads, _) = CountingSource::new();
        let publisher = Publisher::new(Options::default(), source).unwrap();
        let reporter = RecordingReporter::default();

        assert!(publisher.observe(&reporter));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.names().len(), BASE.len());
    }

    #[test]
    fn test_reads_are_throttled() {
        let (source, reads, _) = CountingSource::new();
        let options = Options::new().with_minimum_read_interval(Duration::from_secs(1));
        let publisher = Publisher::new(options, source).unwrap();
        let reporter = RecordingReporter::default();
        let t0 = Instant::now();

        assert!(publisher.observe_at(t0, &reporter));
        assert!(!publisher.observe_at(t0 + Duration::from_millis(500), &reporter));
        assert!(!publisher.observe_at(t0 + Duration::from_millis(999), &reporter));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        // Cached sample is reported on every cycle
        assert_eq!(reporter.names().len(), 3 * BASE.len());
        assert_eq!(threads(&reporter), Some(Value::Int(1)));

        assert!(publisher.observe_at(t0 + Duration::from_secs(1), &reporter));
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(threads(&reporter), Some(Value::Int(2)));

        // The interval restarts from the last read
        assert!(!publisher.observe_at(t0 + Duration::from_millis(1900), &reporter));
        assert!(publisher.observe_at(t0 + Duration::from_secs(2), &reporter));
        assert_eq!(publisher.reads(), 3);
    }

    #[test]
    fn test_zero_interval_reads_every_cycle() {
        let (source, reads, _) = CountingSource::new();
        let options = Options::new().with_minimum_read_interval(Duration::ZERO);
        let publisher = Publisher::new(options, source).unwrap();
        let reporter = RecordingReporter::default();
        let t0 = Instant::now();

        for _ in 0..5 {
            assert!(publisher.observe_at(t0, &reporter));
        }
        assert_eq!(reads.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_one_snapshot_per_cycle() {
        let (source, _, _) = CountingSource::new();
        let options = Options::new().with_minimum_read_interval(Duration::ZERO);
        let publisher = Arc::new(Publisher::new(options, source).unwrap());
        let reporter = Arc::new(RecordingReporter::default());

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let publisher = publisher.clone();
                let reporter = reporter.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        publisher.observe(&reporter);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        // Each cycle is a contiguous block of BASE.len() reports sharing one
        // sample, identified by its thread count and matching heap objects.
        let reports = reporter.reports.lock();
        assert_eq!(reports.len(), 100 * BASE.len());
        for cycle in reports.chunks(BASE.len()) {
            let n = cycle
                .iter()
                .find(|r| r.0 == "runtime.threads")
                .map(|r| r.1)
                .unwrap();
            let objects = cycle
                .iter()
                .find(|r| r.0 == "runtime.mem.heap_objects")
                .map(|r| r.1)
                .unwrap();
            match (n, objects) {
                (Value::Int(n), Value::Int(objects)) => assert_eq!(objects, 6 * n),
                other => panic!("unexpected values {other:?}"),
            }
        }
    }

    #[test]
    fn test_failed_read_keeps_cache_and_retries() {
        let (source, reads, fail) = CountingSource::new();
        let options = Options::new().with_minimum_read_interval(Duration::from_secs(1));
        let publisher = Publisher::new(options, source).unwrap();
        let reporter = RecordingReporter::default();
        let t0 = Instant::now();

        publisher.observe_at(t0, &reporter);
        *fail.lock() = true;
        reporter.clear();

        assert!(!publisher.observe_at(t0 + Duration::from_secs(2), &reporter));
        assert_eq!(threads(&reporter), Some(Value::Int(1)));

        // last_read was not advanced, so the next cycle retries immediately
        *fail.lock() = false;
        assert!(publisher.observe_at(t0 + Duration::from_millis(2100), &reporter));
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_nothing_reported_before_first_sample() {
        let (source, _, fail) = CountingSource::new();
        *fail.lock() = true;
        let publisher = Publisher::new(Options::default(), source).unwrap();
        let reporter = RecordingReporter::default();

        assert!(!publisher.observe(&reporter));
        assert!(reporter.names().is_empty());
    }

    #[test]
    fn test_labels_and_prefix() {
        let (source, _, _) = CountingSource::new();
        let options = Options::new()
            .with_labels([Label::new("app_name", "testapp")])
            .with_metric_prefix("test_app");
        let publisher = Publisher::new(options, source).unwrap();
        let reporter = RecordingReporter::default();

        publisher.register(&reporter).unwrap();
        publisher.observe(&reporter);

        let described = reporter.described.lock().clone();
        assert_eq!(described.len(), BASE.len());
        assert!(described.iter().all(|n| n.starts_with("test_app.runtime.")));

        let reports = reporter.reports.lock();
        assert!(reports
            .iter()
            .all(|r| r.2 == vec![Label::new("app_name", "testapp")]));
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        let (source, _, _) = CountingSource::new();
        let result = Publisher::new(Options::new().with_metric_prefix("9lives"), source);
        assert!(matches!(result, Err(Error::InvalidPrefix(_))));
    }

    #[test]
    fn test_extra_metrics_only_when_enabled() {
        let (source, _, _) = CountingSource::new();
        let publisher = Publisher::new(Options::default(), source).unwrap();
        assert_eq!(publisher.descriptors().count(), BASE.len());

        let (source, _, _) = CountingSource::new();
        let options = Options::new().with_extra_runtime_metrics();
        let publisher = Publisher::new(options, source).unwrap();
        assert_eq!(
            publisher.descriptors().count(),
            BASE.len() + 1 + Extra::ALL.len()
        );

        // Outside a tokio runtime only uptime and live objects are reported
        let reporter = RecordingReporter::default();
        publisher.observe(&reporter);
        assert_eq!(reporter.value_of("runtime.mem.live_objects"), Some(Value::Int(6)));
        assert!(reporter.value_of("runtime.uptime").is_some());
        assert!(reporter.value_of("runtime.tokio.workers").is_none());
    }

    #[tokio::test]
    async fn test_extra_tokio_metrics_inside_runtime() {
        let (source, _, _) = CountingSource::new();
        let options = Options::new().with_extra_runtime_metrics();
        let publisher = Publisher::new(options, source).unwrap();
        let reporter = RecordingReporter::default();

        publisher.observe(&reporter);
        assert_eq!(reporter.value_of("runtime.tokio.workers"), Some(Value::Int(1)));
        assert!(reporter.value_of("runtime.tokio.alive_tasks").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_task_observes_until_shutdown() {
        let (source, reads, _) = CountingSource::new();
        let options = Options::new()
            .with_minimum_read_interval(Duration::ZERO)
            .with_observe_interval(Duration::from_secs(1));
        let publisher = Arc::new(Publisher::new(options, source).unwrap());
        let reporter = Arc::new(RecordingReporter::default());

        let handle = publisher.clone().spawn(reporter.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(reads.load(Ordering::SeqCst) >= 3);

        handle.shutdown().await;
        let after = reads.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(reads.load(Ordering::SeqCst), after);
    }

    #[test]
    fn test_spawn_without_runtime_fails() {
        let (source, _, _) = CountingSource::new();
        let publisher = Arc::new(Publisher::new(Options::default(), source).unwrap());
        let result = publisher.spawn(RecordingReporter::default());
        assert!(matches!(result, Err(Error::NoRuntime)));
    }
}
