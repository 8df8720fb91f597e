//! Benchmark scaffolding for the sync engine's diff-batching primitives.
//!
//! These benchmarks measure pure in-process functions: chunking predicate
//! lists and rendering the `BETWEEN`/`IN` conditions the zoom scanner feeds
//! to `mysqldump`. Live-MySQL scenarios (fingerprint scans, full table
//! syncs) are exercised by `tests/sync_integration_tests.rs` instead, since
//! their cost is dominated by the server round trip, not the in-process
//! logic these benchmarks isolate.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use slicetool_sync::interval::{partition, Interval};

fn bench_partition_ids(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition_ids");
    for size in [100usize, 1_000, 10_000, 100_000] {
        let ids: Vec<u64> = (0..size as u64).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| partition(black_box(1000), black_box(ids)));
        });
    }
    group.finish();
}

fn bench_partition_ranges(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition_ranges");
    for size in [100usize, 1_000, 10_000] {
        let ranges: Vec<Interval> = (0..size as u64).map(|i| Interval::new(i * 10, i * 10 + 9)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &ranges, |b, ranges| {
            b.iter(|| partition(black_box(1000), black_box(ranges)));
        });
    }
    group.finish();
}

fn bench_sql_between_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_between_join");
    for size in [10usize, 100, 1000] {
        let ranges: Vec<Interval> = (0..size as u64).map(|i| Interval::new(i * 10, i * 10 + 9)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &ranges, |b, ranges| {
            b.iter(|| {
                ranges
                    .iter()
                    .map(|r| r.sql_between(black_box("id")))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            });
        });
    }
    group.finish();
}

fn bench_in_list_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_list_join");
    for size in [10usize, 100, 1000] {
        let ids: Vec<u64> = (0..size as u64).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| ids.iter().map(u64::to_string).collect::<Vec<_>>().join(","));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_partition_ids, bench_partition_ranges, bench_sql_between_rendering, bench_in_list_rendering);
criterion_main!(benches);
