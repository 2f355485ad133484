//! tsm write benchmark
//!
//! Writes `series` series of `points` hourly samples each and reports the
//! latency distribution of `write_data`, one row per round.

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use tsm::{stats, Config, Data, IdGenerator, KvStore, SequentialIds, SeriesStore, WalSyncStrategy};

/// tsm write benchmark
#[derive(Parser, Debug)]
#[command(name = "tsm-bench")]
#[command(about = "Measure series write latency of the tsm engine")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./tsm_bench_data")]
    data_dir: String,

    /// Series written per round
    #[arg(short, long, default_value = "101")]
    series: usize,

    /// Samples per series
    #[arg(short, long, default_value = "1000")]
    points: usize,

    /// Number of rounds
    #[arg(short, long, default_value = "4")]
    rounds: usize,

    /// fsync only every N commits instead of every commit
    #[arg(long)]
    sync_every: Option<usize>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tsm=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("tsm-bench v{}", tsm::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    let strategy = match args.sync_every {
        Some(count) => WalSyncStrategy::EveryNEntries { count },
        None => WalSyncStrategy::EveryWrite,
    };
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .wal_sync_strategy(strategy)
        .build();

    let store = match KvStore::open(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };
    println!("Connected to {}", store.description());

    let data = hourly_series(args.points);
    let label = format!("{}x{}", args.series, args.points);

    println!(
        "{:>10}|{:>12}|{:>12}|{:>12}|{:>12}|{:>12}",
        "Round", "Desc", "Min", "Max", "Mean", "Median"
    );
    for round in 1..=args.rounds {
        let ids = SequentialIds::new(format!("r{}_id_", round));
        let latencies = match write_round(&store, &ids, &data, args.series) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("Round {} failed: {}", round, e);
                std::process::exit(1);
            }
        };

        match stats::summarize(&latencies) {
            Ok(summary) => println!(
                "{:>10}|{:>12}|{:>12}|{:>12}|{:>12}|{:>12}",
                round,
                label,
                micros(summary.min),
                micros(summary.max),
                micros(summary.mean),
                micros(summary.median),
            ),
            Err(e) => tracing::warn!("Round {} produced no timings: {}", round, e),
        }
    }

    if let Err(e) = store.close() {
        tracing::error!("Failed to close store: {}", e);
        std::process::exit(1);
    }
}

/// `n` samples 0, 1, 2, ... one hour apart from 2015-01-01T00:00Z
fn hourly_series(n: usize) -> Data {
    // 2015-01-01T00:00:00Z
    let start = DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_420_070_400);
    let mut data = Data::with_capacity(n);
    for i in 0..n {
        data.push(start + Duration::hours(i as i64), i as f64);
    }
    data
}

/// Write one batch per series, returning each write's latency in microseconds
fn write_round(store: &KvStore, ids: &dyn IdGenerator, data: &Data, series: usize) -> tsm::Result<Vec<f64>> {
    let mut latencies = Vec::with_capacity(series);
    for _ in 0..series {
        let id = ids.next_id();
        let started = Instant::now();
        store.write_data(&id, "domain", data)?;
        latencies.push(started.elapsed().as_secs_f64() * 1e6);
    }
    Ok(latencies)
}

fn micros(us: f64) -> String {
    format!("{:.1}µs", us)
}
