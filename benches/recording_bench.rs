//! Recording cost of bound and unbound instruments, and of one
//! runtime statistics observation cycle

use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use metrics_exporter_prometheus::PrometheusBuilder;
use otel_playground::demo::basic_api::{RequestInstruments, LATENCY_BUCKETS};

const THREADS: usize = 4;

fn install_recorder() {
    let recorder = PrometheusBuilder::new()
        .set_buckets(&LATENCY_BUCKETS)
        .unwrap()
        .build_recorder();
    // Ignore the error if another benchmark already installed it
    let _ = metrics::set_global_recorder(recorder);
}

/// Split `iters` over `THREADS` scoped threads and time the whole batch
fn run_parallel(iters: u64, record: impl Fn() + Sync) -> Duration {
    let per_thread = iters / THREADS as u64 + 1;
    let start = Instant::now();
    std::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..per_thread {
                    record();
                }
            });
        }
    });
    start.elapsed()
}

fn recording_benchmark(c: &mut Criterion) {
    install_recorder();
    let instruments = RequestInstruments::new();

    let mut group = c.benchmark_group("recording");
    group.throughput(Throughput::Elements(1));

    group.bench_function("binding", |b| {
        b.iter(|| instruments.record_bound(black_box(100), black_box(100.0)))
    });

    group.bench_function("nobinding", |b| {
        b.iter(|| instruments.record(black_box(100), black_box(100.0)))
    });

    group.bench_function("binding-parallel", |b| {
        b.iter_custom(|iters| {
            run_parallel(iters, || instruments.record_bound(black_box(100), black_box(100.0)))
        })
    });

    group.bench_function("nobinding-parallel", |b| {
        b.iter_custom(|iters| {
            run_parallel(iters, || instruments.record(black_box(100), black_box(100.0)))
        })
    });

    group.finish();
}

fn observe_benchmark(c: &mut Criterion) {
    install_recorder();

    let options = memstats::Options::new()
        .with_extra_runtime_metrics()
        .with_labels([memstats::Label::new("app_name", "bench")]);
    let source = || -> memstats::Result<memstats::Snapshot> { Ok(memstats::Snapshot::default()) };
    let publisher = memstats::Publisher::new(options, source).unwrap();
    publisher.register(&memstats::MetricsReporter).unwrap();

    let mut group = c.benchmark_group("runtime_stats");

    group.bench_function("observe_cached", |b| {
        b.iter(|| black_box(publisher.observe(&memstats::MetricsReporter)))
    });

    group.finish();
}

criterion_group!(benches, recording_benchmark, observe_benchmark);
criterion_main!(benches);
