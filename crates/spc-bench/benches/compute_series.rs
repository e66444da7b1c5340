// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use spc_bench::step_points;
use spc_core::SpcConfig;
use spc_online::{compute_series, compute_with_checkpoint, extend_series};

fn bench_full_compute(c: &mut Criterion, case_id: &str, n: usize) {
    let points = step_points(n, 42);
    let config = SpcConfig::default();

    c.bench_function(case_id, |b| {
        b.iter(|| {
            compute_series(black_box(&points), None, black_box(&config))
                .expect("benchmark compute should succeed");
        })
    });
}

fn bench_extend_one_point(c: &mut Criterion, case_id: &str, n: usize) {
    let points = step_points(n + 1, 42);
    let config = SpcConfig::default();
    let head = compute_with_checkpoint(&points[..n], None, &config)
        .expect("benchmark checkpoint should succeed");

    c.bench_function(case_id, |b| {
        b.iter_batched(
            || head.clone(),
            |checkpoint| {
                extend_series(checkpoint, black_box(&points[n..]))
                    .expect("benchmark extension should succeed")
            },
            BatchSize::SmallInput,
        )
    });
}

fn benchmarks(c: &mut Criterion) {
    bench_full_compute(c, "compute_series_n53", 53);
    bench_full_compute(c, "compute_series_n10000", 10_000);
    bench_extend_one_point(c, "extend_series_n10000_plus1", 10_000);
}

criterion_group!(benches, benchmarks);
criterion_main!(benches);
