// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use chrono::{Days, NaiveDate};
use libfuzzer_sys::fuzz_target;
use spc_core::{MetricPoint, SpcConfig};
use spc_online::{compute_series, compute_with_checkpoint, extend_series};

const MAX_POINTS: usize = 512;

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let config = SpcConfig::default()
        .with_min_phase_size(common::bounded(cursor.next_u8(), 0, 16))
        .with_run_length(common::bounded(cursor.next_u8(), 0, 12))
        .with_two_of_three_opens_phase(cursor.next_u8() & 1 == 0)
        .with_clamp_lcl_at_zero(cursor.next_u8() & 1 == 0);

    let Some(start) = NaiveDate::from_ymd_opt(2020, 1, 1) else {
        return;
    };
    let mut day = 0u64;
    let mut points = Vec::new();
    while !cursor.is_exhausted() && points.len() < MAX_POINTS {
        // Occasionally repeat a day to exercise the timestamp check.
        day += u64::from(cursor.next_u8() % 3);
        let Some(timestamp) = start.checked_add_days(Days::new(day)) else {
            return;
        };
        // Mostly small finite values; raw bit patterns reach NaN, inf and
        // magnitudes whose ranges overflow.
        let value = if cursor.next_u8() % 8 == 0 {
            cursor.next_f64()
        } else {
            f64::from(cursor.next_u16()) / 64.0
        };
        points.push(MetricPoint::new(timestamp, value));
    }

    let full = compute_series(&points, None, &config);
    if let Ok(series) = &full {
        assert_eq!(series.len(), points.len());
        for point in &series.points {
            assert!(point.lcl.is_finite() && point.ucl.is_finite());
            assert!(point.lcl <= point.cl && point.cl <= point.ucl);
            assert!(point.moving_range.is_none_or(f64::is_finite));
        }
        assert!(series.summary.mean.is_finite());
    }

    if points.len() >= 2 {
        let split = points.len() / 2;
        if let Ok(head) = compute_with_checkpoint(&points[..split], None, &config) {
            let extended = extend_series(head, &points[split..]).map(|c| c.into_series());
            if let (Ok(full), Ok(extended)) = (&full, &extended) {
                assert_eq!(full, extended);
            }
        }
    }
});
