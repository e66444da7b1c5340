// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Deterministic fixtures shared by the criterion benchmarks.

use chrono::{Days, NaiveDate};
use spc_core::MetricPoint;
use spc_rollup::StationSeries;

/// Daily points starting 2024-01-01: a noisy level with a step at `n / 2`.
pub fn step_points(n: usize, seed: u64) -> Vec<MetricPoint> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
    (0..n)
        .filter_map(|i| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let noise = ((state >> 33) % 1_000) as f64 / 100.0 - 5.0;
            let level = if i >= n / 2 { 115.0 } else { 100.0 };
            let ts = start.checked_add_days(Days::new(i as u64))?;
            Some(MetricPoint::new(ts, level + noise))
        })
        .collect()
}

/// `stations` station series for one KPI sharing the same `n` days.
pub fn station_fixture(stations: usize, n: usize, kpi_id: &str) -> Vec<StationSeries> {
    (0..stations)
        .map(|s| StationSeries::new(format!("ST{s:03}"), kpi_id, step_points(n, s as u64)))
        .collect()
}
