// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use spc_core::{Granularity, MetricPoint, SpcError, YoyLookup, validate_reference};

/// A point next to its year-ago counterpart.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoyPoint {
    pub timestamp: NaiveDate,
    pub value: f64,
    pub yoy_value: Option<f64>,
    pub yoy_delta: Option<f64>,
}

/// Aligns `points` with `reference` at the granularity's year-ago offset.
pub fn align_yoy(
    points: &[MetricPoint],
    reference: &[MetricPoint],
    granularity: Granularity,
) -> Result<Vec<YoyPoint>, SpcError> {
    validate_reference(reference)?;
    let lookup = YoyLookup::new(reference, granularity);
    Ok(points
        .iter()
        .map(|point| {
            let (yoy_value, yoy_delta) = lookup.align(point);
            YoyPoint {
                timestamp: point.timestamp,
                value: point.value,
                yoy_value,
                yoy_delta,
            }
        })
        .collect())
}
