// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::compute::materialize;
use crate::segmenter::{Segmentation, segment, segment_from};
use spc_core::{MetricPoint, Series, SpcConfig, SpcError, validate_points, validate_reference};

/// A computed series plus everything needed to extend it without starting over.
///
/// Only the open phase is ever recomputed: closed phases and their points are
/// carried forward as-is.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesCheckpoint {
    pub config: SpcConfig,
    pub points: Vec<MetricPoint>,
    pub reference_points: Option<Vec<MetricPoint>>,
    pub segmentation: Segmentation,
    pub series: Series,
}

impl SeriesCheckpoint {
    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn into_series(self) -> Series {
        self.series
    }

    pub(crate) fn validate(&self) -> Result<(), SpcError> {
        self.config.validate()?;
        let n = self.points.len();
        if self.segmentation.len() != n
            || self.series.len() != n
            || self.segmentation.state.next_index != n
        {
            return Err(SpcError::invalid_input(format!(
                "checkpoint is inconsistent: {n} points, {} marks, {} enriched points, next_index={}",
                self.segmentation.len(),
                self.series.len(),
                self.segmentation.state.next_index
            )));
        }
        if self.segmentation.open_phase_start() > n {
            return Err(SpcError::invalid_input(format!(
                "checkpoint open phase starts at {} beyond {n} points",
                self.segmentation.open_phase_start()
            )));
        }
        if self.segmentation.state.last_value != self.points.last().map(|point| point.value) {
            return Err(SpcError::invalid_input(
                "checkpoint segmenter state does not end on the last point",
            ));
        }
        Ok(())
    }
}

/// Computes a series and keeps the state needed for [`extend_series`].
pub fn compute_with_checkpoint(
    points: &[MetricPoint],
    reference_points: Option<&[MetricPoint]>,
    config: &SpcConfig,
) -> Result<SeriesCheckpoint, SpcError> {
    config.validate()?;
    validate_points(points)?;
    if let Some(reference) = reference_points {
        validate_reference(reference)?;
    }

    let values: Vec<f64> = points.iter().map(|point| point.value).collect();
    let segmentation = segment(&values, config)?;
    let series = materialize(points, reference_points, &segmentation, config, Vec::new())?;
    Ok(SeriesCheckpoint {
        config: config.clone(),
        points: points.to_vec(),
        reference_points: reference_points.map(<[MetricPoint]>::to_vec),
        segmentation,
        series,
    })
}

/// Appends `new_points` to a checkpointed series.
///
/// The result equals [`compute_series`](crate::compute_series) over the
/// concatenated points; only the tail from the open phase's start is redone.
pub fn extend_series(
    checkpoint: SeriesCheckpoint,
    new_points: &[MetricPoint],
) -> Result<SeriesCheckpoint, SpcError> {
    checkpoint.validate()?;
    if new_points.is_empty() {
        return Ok(checkpoint);
    }

    let base = checkpoint.points.len();
    let mut previous = checkpoint.points.last().map(|point| point.timestamp);
    for (offset, point) in new_points.iter().enumerate() {
        let index = base + offset;
        if !point.value.is_finite() {
            return Err(SpcError::NonFiniteValue { index });
        }
        if previous.is_some_and(|ts| point.timestamp <= ts) {
            return Err(SpcError::NonMonotonicTimestamps { index });
        }
        previous = Some(point.timestamp);
    }

    let SeriesCheckpoint {
        config,
        mut points,
        reference_points,
        segmentation,
        series,
    } = checkpoint;

    let reuse = segmentation.open_phase_start();
    let values: Vec<f64> = new_points.iter().map(|point| point.value).collect();
    let segmentation = segment_from(segmentation, &values, &config)?;
    points.extend_from_slice(new_points);

    let mut prefix = series.points;
    prefix.truncate(reuse);
    let series = materialize(
        &points,
        reference_points.as_deref(),
        &segmentation,
        &config,
        prefix,
    )?;

    Ok(SeriesCheckpoint {
        config,
        points,
        reference_points,
        segmentation,
        series,
    })
}
