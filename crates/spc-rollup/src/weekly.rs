// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::{Datelike, Days, NaiveDate};
use spc_core::{AggKind, MetricPoint, SpcError};
use std::collections::BTreeMap;

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
}

/// Buckets daily points into Monday-start weeks combined with `agg`.
///
/// Partial weeks at either end are kept; an empty input yields no weeks.
pub fn aggregate_to_weeks(daily: &[MetricPoint], agg: AggKind) -> Result<Vec<MetricPoint>, SpcError> {
    let mut buckets: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (index, point) in daily.iter().enumerate() {
        if !point.value.is_finite() {
            return Err(SpcError::NonFiniteValue { index });
        }
        if index > 0 && point.timestamp <= daily[index - 1].timestamp {
            return Err(SpcError::NonMonotonicTimestamps { index });
        }
        let week = week_start(point.timestamp).ok_or_else(|| {
            SpcError::invalid_input(format!(
                "timestamp {} has no representable week start",
                point.timestamp
            ))
        })?;
        buckets.entry(week).or_default().push(point.value);
    }

    Ok(buckets
        .into_iter()
        .filter_map(|(week, values)| agg.combine(&values).map(|value| MetricPoint::new(week, value)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{aggregate_to_weeks, week_start};
    use chrono::{Days, NaiveDate};
    use spc_core::{AggKind, MetricPoint, SpcError};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("test date should be valid")
    }

    fn days_from(start: NaiveDate, values: &[f64]) -> Vec<MetricPoint> {
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

    #[test]
    fn week_start_is_monday() {
        assert_eq!(week_start(date(2025, 1, 8)), Some(date(2025, 1, 6)));
        assert_eq!(week_start(date(2025, 1, 6)), Some(date(2025, 1, 6)));
        assert_eq!(week_start(date(2025, 1, 5)), Some(date(2024, 12, 30)));
    }

    #[test]
    fn buckets_partial_and_full_weeks() {
        // Saturday 2025-01-04 through Monday 2025-01-13.
        let daily = days_from(date(2025, 1, 4), &[1.0, 2.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 3.0, 9.0]);

        let sums = aggregate_to_weeks(&daily, AggKind::Sum).expect("weekly sums");
        assert_eq!(
            sums,
            vec![
                MetricPoint::new(date(2024, 12, 30), 3.0),
                MetricPoint::new(date(2025, 1, 6), 21.0),
                MetricPoint::new(date(2025, 1, 13), 9.0),
            ]
        );

        let means = aggregate_to_weeks(&daily, AggKind::Mean).expect("weekly means");
        assert_eq!(means[0].value, 1.5);
        assert_eq!(means[1].value, 3.0);
    }

    #[test]
    fn rejects_unordered_or_non_finite_days() {
        let mut daily = days_from(date(2025, 1, 6), &[1.0, 2.0]);
        daily.swap(0, 1);
        assert_eq!(
            aggregate_to_weeks(&daily, AggKind::Mean),
            Err(SpcError::NonMonotonicTimestamps { index: 1 })
        );

        let daily = days_from(date(2025, 1, 6), &[1.0, f64::INFINITY]);
        assert_eq!(
            aggregate_to_weeks(&daily, AggKind::Mean),
            Err(SpcError::NonFiniteValue { index: 1 })
        );
        assert_eq!(aggregate_to_weeks(&[], AggKind::Sum), Ok(vec![]));
    }
}
