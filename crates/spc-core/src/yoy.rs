// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::Granularity;
use crate::series::MetricPoint;
use chrono::{Days, NaiveDate};

/// Calendar offset to the year-ago point: 365 days, or 52 weekly periods.
pub fn yoy_offset(granularity: Granularity) -> Days {
    match granularity {
        Granularity::Daily => Days::new(365),
        Granularity::Weekly => Days::new(52 * 7),
    }
}

/// Year-over-year lookup over a validated, strictly increasing reference.
#[derive(Clone, Copy, Debug)]
pub struct YoyLookup<'a> {
    reference: &'a [MetricPoint],
    offset: Days,
}

impl<'a> YoyLookup<'a> {
    pub fn new(reference: &'a [MetricPoint], granularity: Granularity) -> Self {
        Self {
            reference,
            offset: yoy_offset(granularity),
        }
    }

    /// Reference value exactly one offset before `timestamp`.
    pub fn value_for(&self, timestamp: NaiveDate) -> Option<f64> {
        let target = timestamp.checked_sub_days(self.offset)?;
        self.reference
            .binary_search_by_key(&target, |point| point.timestamp)
            .ok()
            .map(|idx| self.reference[idx].value)
    }

    /// `(yoy_value, yoy_delta)`; both `None` without a reference point.
    pub fn align(&self, point: &MetricPoint) -> (Option<f64>, Option<f64>) {
        match self.value_for(point.timestamp) {
            Some(yoy_value) => (Some(yoy_value), Some(point.value - yoy_value)),
            None => (None, None),
        }
    }
}
