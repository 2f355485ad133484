//! Benchmarks for tsm series operations

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::TempDir;
use tsm::{Config, Data, KvStore, SeriesStore, WalSyncStrategy};

fn hourly_series(n: usize) -> Data {
    let start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
    let mut data = Data::with_capacity(n);
    for i in 0..n {
        data.push(start + Duration::hours(i as i64), i as f64);
    }
    data
}

fn open_store(dir: &TempDir) -> KvStore {
    let config = Config::builder()
        .data_dir(dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 64 })
        .build();
    KvStore::open(config).unwrap()
}

fn storage_benchmarks(c: &mut Criterion) {
    let data = hourly_series(1000);

    c.bench_function("write_1000_new_series", |b| {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            store.write_data(&format!("id_{}", n), "bench", &data).unwrap();
        });
    });

    c.bench_function("rewrite_1000_same_series", |b| {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        b.iter(|| store.write_data("id", "bench", &data).unwrap());
    });

    c.bench_function("write_1_into_100k_series", |b| {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let large = hourly_series(100_000);
        store.write_data("id", "bench", &large).unwrap();
        let mut one = Data::with_capacity(1);
        one.push(large.times[large.len() - 1], 0.0);
        b.iter(|| store.write_data("id", "bench", &one).unwrap());
    });

    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.write_data("id", "bench", &data).unwrap();
    let start = data.times[100];
    let end = data.times[899];

    c.bench_function("read_800_of_1000", |b| {
        b.iter(|| store.read_data("id", "bench", start, end).unwrap());
    });

    c.bench_function("describe_1000", |b| {
        b.iter(|| store.describe("id", "bench").unwrap());
    });

    c.bench_function("open_with_snapshot", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let store = open_store(&dir);
                store.write_data("id", "bench", &data).unwrap();
                store.close().unwrap();
                dir
            },
            |dir| {
                let store = open_store(&dir);
                (store, dir)
            },
            BatchSize::PerIteration,
        );
    });
}

criterion_group!(benches, storage_benchmarks);
criterion_main!(benches);
