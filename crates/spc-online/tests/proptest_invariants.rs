// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use spc_core::{MetricPoint, Series, SignalState, SpcConfig};
use spc_online::{compute_series, compute_with_checkpoint, extend_series};

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn to_points(values: &[f64]) -> Vec<MetricPoint> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).expect("test date should be valid");
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let ts = start
                .checked_add_days(Days::new(i as u64))
                .expect("test date should be valid");
            MetricPoint::new(ts, value)
        })
        .collect()
}

/// Noisy values around a handful of levels so shifts actually happen.
fn regime_values_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((0u8..4, -6.0f64..6.0), 1..160).prop_map(|raw| {
        let mut level = 0u8;
        raw.into_iter()
            .enumerate()
            .map(|(i, (candidate, noise))| {
                if i % 17 == 0 {
                    level = candidate;
                }
                f64::from(level) * 25.0 + noise
            })
            .collect()
    })
}

fn config_strategy() -> impl Strategy<Value = SpcConfig> {
    (2usize..12, 2usize..10, any::<bool>(), any::<bool>()).prop_map(
        |(min_phase_size, run_length, two_of_three, clamp)| {
            SpcConfig::default()
                .with_min_phase_size(min_phase_size)
                .with_run_length(run_length)
                .with_two_of_three_opens_phase(two_of_three)
                .with_clamp_lcl_at_zero(clamp)
        },
    )
}

fn assert_partition(series: &Series, config: &SpcConfig) -> Result<(), TestCaseError> {
    let n = series.len();
    prop_assert!(!series.phases.is_empty());
    prop_assert_eq!(series.phases[0].start_index, 0);

    let last = series.phases.len() - 1;
    for (pos, phase) in series.phases.iter().enumerate() {
        prop_assert_eq!(phase.phase_number as usize, pos + 1);
        if pos == last {
            prop_assert_eq!(phase.end_index, None);
        } else {
            let end = phase.end_index.expect("closed phase should have an end");
            prop_assert_eq!(series.phases[pos + 1].start_index, end);
            prop_assert!(!phase.provisional);
            prop_assert!(phase.len(n) >= config.min_phase_size);
        }
        for idx in phase.start_index..phase.end_or(n) {
            let point = &series.points[idx];
            prop_assert_eq!(point.phase_number, phase.phase_number);
            prop_assert_eq!(point.cl, phase.limits.cl);
            prop_assert_eq!(point.ucl, phase.limits.ucl);
            prop_assert_eq!(point.lcl, phase.limits.lcl);
            prop_assert_eq!(point.phase_start, idx == phase.start_index);
            if phase.provisional {
                prop_assert!(!point.mr_signal);
                // Only the triggering run can carry signals into a reseeded phase.
                if phase.opened_by.is_none() {
                    prop_assert_eq!(point.signal_state, SignalState::None);
                }
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn limits_are_ordered_and_finite(values in regime_values_strategy(), config in config_strategy()) {
        let series = compute_series(&to_points(&values), None, &config)
            .expect("generated series should compute");
        prop_assert_eq!(series.len(), values.len());
        for point in &series.points {
            prop_assert!(point.lcl.is_finite() && point.cl.is_finite() && point.ucl.is_finite());
            prop_assert!(point.lcl <= point.cl, "lcl {} > cl {}", point.lcl, point.cl);
            prop_assert!(point.cl <= point.ucl, "cl {} > ucl {}", point.cl, point.ucl);
            prop_assert!(point.sigma >= 0.0);
            if config.clamp_lcl_at_zero && point.cl >= 0.0 {
                prop_assert!(point.lcl >= 0.0);
            }
        }
    }

    #[test]
    fn phases_partition_the_series(values in regime_values_strategy(), config in config_strategy()) {
        let series = compute_series(&to_points(&values), None, &config)
            .expect("generated series should compute");
        assert_partition(&series, &config)?;
        prop_assert_eq!(series.diagnostics.phase_count, series.phases.len());
        prop_assert_eq!(series.signal_state(), series.summary.signal_state);
    }

    #[test]
    fn computation_is_deterministic(values in regime_values_strategy(), config in config_strategy()) {
        let points = to_points(&values);
        let first = compute_series(&points, None, &config).expect("first run");
        let second = compute_series(&points, None, &config).expect("second run");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn extension_equals_full_recomputation(
        values in regime_values_strategy(),
        config in config_strategy(),
        split_seed in any::<prop::sample::Index>(),
    ) {
        let points = to_points(&values);
        let split = split_seed.index(points.len()).max(1);
        let full = compute_series(&points, None, &config).expect("full run");
        let head = compute_with_checkpoint(&points[..split], None, &config).expect("head run");
        let extended = extend_series(head, &points[split..]).expect("extension");
        prop_assert_eq!(extended.series, full);
    }
}
