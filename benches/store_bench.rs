//! Benchmarks for the in-memory job store.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use deferq::config::FetchConfig;
use deferq::job::Job;
use deferq::store::{InMemoryJobStore, JobStore};

fn non_waiting_store() -> Arc<InMemoryJobStore> {
    Arc::new(InMemoryJobStore::with_config(FetchConfig {
        wait: false,
        wait_delay: Duration::from_millis(10),
    }))
}

fn filled_store(jobs: usize) -> Arc<InMemoryJobStore> {
    let store = non_waiting_store();
    let due = Utc::now() - ChronoDuration::seconds(1);
    for _ in 0..jobs {
        let mut job = Job::new("bench", None, &store).with_start_at(due);
        job.enqueue().unwrap();
    }
    store
}

fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue");
    for size in [1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| filled_store(n));
        });
    }
    group.finish();
}

fn bench_fetch_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_drain");
    for size in [1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter_batched(
                || filled_store(n),
                |store| while store.fetch().is_some() {},
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_threaded_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("threaded_drain");
    group.sample_size(10);
    group.throughput(Throughput::Elements(10_000));
    group.bench_function(BenchmarkId::new("jobs", "10k_x_10_threads"), |b| {
        b.iter_batched(
            || filled_store(10_000),
            |store| {
                let threads: Vec<_> = (0..10)
                    .map(|_| {
                        let store = Arc::clone(&store);
                        thread::spawn(move || while store.fetch().is_some() {})
                    })
                    .collect();
                for handle in threads {
                    handle.join().unwrap();
                }
            },
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_enqueue, bench_fetch_drain, bench_threaded_drain);
criterion_main!(benches);
