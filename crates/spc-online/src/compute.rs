// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::segmenter::{Segmentation, segment};
use spc_core::{
    Diagnostics, EnrichedPoint, MetricPoint, Phase, RuleId, Series, SeriesSummary, SpcConfig,
    SpcError, YoyLookup, validate_points, validate_reference,
};

/// One independent series computation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesRequest {
    pub points: Vec<MetricPoint>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub reference_points: Option<Vec<MetricPoint>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub config: SpcConfig,
}

impl SeriesRequest {
    pub fn new(points: Vec<MetricPoint>) -> Self {
        Self {
            points,
            reference_points: None,
            config: SpcConfig::default(),
        }
    }

    pub fn with_reference(mut self, reference_points: Vec<MetricPoint>) -> Self {
        self.reference_points = Some(reference_points);
        self
    }

    pub fn with_config(mut self, config: SpcConfig) -> Self {
        self.config = config;
        self
    }

    pub fn compute(&self) -> Result<Series, SpcError> {
        compute_series(
            &self.points,
            self.reference_points.as_deref(),
            &self.config,
        )
    }
}

/// Segments, classifies, and enriches `points`.
///
/// Identical inputs always produce bit-identical output.
pub fn compute_series(
    points: &[MetricPoint],
    reference_points: Option<&[MetricPoint]>,
    config: &SpcConfig,
) -> Result<Series, SpcError> {
    config.validate()?;
    validate_points(points)?;
    if let Some(reference) = reference_points {
        validate_reference(reference)?;
    }

    let values: Vec<f64> = points.iter().map(|point| point.value).collect();
    let segmentation = segment(&values, config)?;
    materialize(points, reference_points, &segmentation, config, Vec::new())
}

/// Builds the enriched series, reusing `prefix` for points that precede the
/// open phase and enriching everything after it.
pub(crate) fn materialize(
    points: &[MetricPoint],
    reference_points: Option<&[MetricPoint]>,
    segmentation: &Segmentation,
    config: &SpcConfig,
    prefix: Vec<EnrichedPoint>,
) -> Result<Series, SpcError> {
    let n = points.len();
    if segmentation.marks.len() != n {
        return Err(SpcError::invalid_input(format!(
            "segmentation covers {} points but the series has {n}",
            segmentation.marks.len()
        )));
    }

    let phases = segmentation.phases(config);
    let yoy = YoyLookup::new(reference_points.unwrap_or(&[]), config.granularity);
    let from = prefix.len();
    let mut enriched = prefix;
    enriched.reserve(n - from);

    let mut cursor = phases
        .iter()
        .position(|phase| phase.contains(from, n))
        .unwrap_or(phases.len());
    for idx in from..n {
        while cursor < phases.len() && !phases[cursor].contains(idx, n) {
            cursor += 1;
        }
        let Some(phase) = phases.get(cursor) else {
            return Err(SpcError::invalid_input(format!(
                "no phase covers point {idx}"
            )));
        };
        enriched.push(enrich(points, idx, phase, segmentation, &yoy));
    }

    let summary = SeriesSummary::over(&enriched, &phases).ok_or(SpcError::EmptyInput)?;
    let diagnostics = diagnose(&enriched, &phases, reference_points, config);
    Ok(Series {
        points: enriched,
        phases,
        summary,
        diagnostics,
    })
}

fn enrich(
    points: &[MetricPoint],
    idx: usize,
    phase: &Phase,
    segmentation: &Segmentation,
    yoy: &YoyLookup<'_>,
) -> EnrichedPoint {
    let point = points[idx];
    let mark = &segmentation.marks[idx];
    let phase_start = idx == phase.start_index;
    let moving_range = (!phase_start).then(|| (point.value - points[idx - 1].value).abs());
    let (yoy_value, yoy_delta) = yoy.align(&point);
    let limits = phase.limits;

    EnrichedPoint {
        timestamp: point.timestamp,
        value: point.value,
        yoy_value,
        yoy_delta,
        signal_state: mark.signal_state,
        rules: mark.rules.clone(),
        cl: limits.cl,
        ucl: limits.ucl,
        lcl: limits.lcl,
        sigma: limits.sigma,
        mr_bar: limits.mr_bar,
        phase_number: phase.phase_number,
        phase_start,
        moving_range,
        mr_signal: !phase.provisional && moving_range.is_some_and(|mr| mr > limits.mr_ucl),
    }
}

fn diagnose(
    points: &[EnrichedPoint],
    phases: &[Phase],
    reference_points: Option<&[MetricPoint]>,
    config: &SpcConfig,
) -> Diagnostics {
    let n = points.len();
    let mut notes: Vec<String> = phases
        .iter()
        .filter_map(|phase| {
            phase.opened_by.map(|rule| {
                format!(
                    "phase {} opened at index {} by {}",
                    phase.phase_number,
                    phase.start_index,
                    rule.as_str()
                )
            })
        })
        .collect();

    let provisional_points: usize = phases
        .iter()
        .filter(|phase| phase.provisional)
        .map(|phase| phase.len(n))
        .sum();
    if let Some(phase) = phases.last().filter(|phase| phase.provisional) {
        notes.push(format!(
            "phase {} is provisional: {} of {} points",
            phase.phase_number,
            phase.len(n),
            config.min_phase_size
        ));
    }

    let mut warnings = vec![];
    if let Some(reference) = reference_points {
        if !reference.is_empty() && points.iter().all(|point| point.yoy_value.is_none()) {
            warnings.push("no reference point aligned at the year-ago offset".to_string());
        }
    }

    Diagnostics {
        n,
        phase_count: phases.len(),
        shift_count: phases.len().saturating_sub(1),
        outlier_count: points
            .iter()
            .filter(|point| point.rules.contains(&RuleId::Beyond3Sigma))
            .count(),
        provisional_points,
        notes,
        warnings,
        ..Diagnostics::default()
    }
}

#[cfg(test)]
mod tests {
    use super::{SeriesRequest, compute_series};
    use chrono::{Days, NaiveDate};
    use spc_core::{Granularity, MetricPoint, SignalState, SpcConfig, SpcError};

    fn points_from(start: NaiveDate, values: &[f64]) -> Vec<MetricPoint> {
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

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).expect("test date should be valid")
    }

    #[test]
    fn provisional_series_carries_limits_but_no_signal() {
        let points = points_from(start(), &[3.0, 40.0, -12.0, 77.0, 5.0]);
        let series = compute_series(&points, None, &SpcConfig::default()).expect("compute");

        assert_eq!(series.len(), 5);
        assert_eq!(series.phases.len(), 1);
        assert!(series.phases[0].provisional);
        assert_eq!(series.signal_state(), SignalState::None);
        for point in &series.points {
            assert_eq!(point.signal_state, SignalState::None);
            assert!(point.lcl <= point.cl && point.cl <= point.ucl);
            assert_eq!(point.cl, series.phases[0].limits.cl);
        }
        assert_eq!(series.diagnostics.provisional_points, 5);
        assert!(
            series
                .diagnostics
                .notes
                .iter()
                .any(|note| note.contains("provisional"))
        );
    }

    #[test]
    fn marks_phase_starts_and_moving_ranges() {
        let mut values: Vec<f64> = (0..11)
            .map(|i| if i % 2 == 0 { 97.18 } else { 102.82 })
            .collect();
        values.extend([103.0; 8]);
        let series = compute_series(&points_from(start(), &values), None, &SpcConfig::default())
            .expect("compute");

        assert_eq!(series.phases.len(), 2);
        assert!(series.points[0].phase_start);
        assert!(series.points[11].phase_start);
        assert_eq!(series.points[11].moving_range, None);
        assert_eq!(series.points[12].moving_range, Some(0.0));
        assert_eq!(series.points[11].phase_number, 2);
        assert_eq!(series.points[11].cl, 103.0);
        assert_eq!(series.summary.latest_phase_number, 2);
        assert_eq!(series.diagnostics.shift_count, 1);
        assert_eq!(
            series.diagnostics.notes,
            vec!["phase 2 opened at index 11 by run_on_one_side".to_string()]
        );
    }

    #[test]
    fn flags_moving_range_beyond_its_limit_without_changing_state() {
        // cl = 100, mr_bar = 5.64, so mr_ucl = 18.43 and the NPL are 85..115.
        let mut values: Vec<f64> = (0..12)
            .map(|i| if i % 2 == 0 { 97.18 } else { 102.82 })
            .collect();
        values.extend([88.0, 112.0]);
        let series = compute_series(&points_from(start(), &values), None, &SpcConfig::default())
            .expect("compute");

        assert_eq!(series.phases.len(), 1);
        let limits = series.phases[0].limits;
        assert!((limits.mr_ucl - 3.268 * 5.64).abs() < 1e-9);

        let jump = &series.points[13];
        assert!(jump.moving_range.is_some_and(|mr| (mr - 24.0).abs() < 1e-9));
        assert!(jump.mr_signal);
        assert_eq!(jump.signal_state, SignalState::None);
        assert!(jump.rules.is_empty());

        assert!(!series.points[12].mr_signal);
        assert!(series.points[..12].iter().all(|point| !point.mr_signal));
        assert_eq!(series.signal_state(), SignalState::None);
    }

    #[test]
    fn extreme_constant_series_is_in_control() {
        let points = points_from(start(), &[1e308; 20]);
        let series = compute_series(&points, None, &SpcConfig::default()).expect("compute");

        assert_eq!(series.phases.len(), 1);
        for point in &series.points {
            assert_eq!(point.signal_state, SignalState::None);
            assert_eq!((point.lcl, point.cl, point.ucl), (1e308, 1e308, 1e308));
        }
        assert_eq!(series.summary.mean, 1e308);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn extreme_values_survive_json() {
        let points = points_from(start(), &[1e308; 20]);
        let series = compute_series(&points, None, &SpcConfig::default()).expect("compute");
        let encoded = serde_json::to_string(&series).expect("series should serialize");
        let decoded: spc_core::Series =
            serde_json::from_str(&encoded).expect("series should deserialize");
        assert_eq!(decoded, series);
    }

    #[test]
    fn rejects_value_ranges_wider_than_f64() {
        let points = points_from(start(), &[1e308, 1e308, -1e308, 1.0]);
        let err = compute_series(&points, None, &SpcConfig::default())
            .expect_err("overflowing range must fail");
        assert_eq!(err, SpcError::LimitOverflow { index: 2 });
    }

    #[test]
    fn aligns_year_ago_reference() {
        let march_first = NaiveDate::from_ymd_opt(2025, 3, 1).expect("test date should be valid");
        let points = points_from(march_first, &[10.0, 11.0, 12.0]);
        let reference = points_from(
            NaiveDate::from_ymd_opt(2024, 3, 2).expect("test date should be valid"),
            &[8.0],
        );
        let series = compute_series(&points, Some(&reference), &SpcConfig::default())
            .expect("compute");

        assert_eq!(series.points[0].yoy_value, None);
        assert_eq!(series.points[0].yoy_delta, None);
        assert_eq!(series.points[1].yoy_value, Some(8.0));
        assert_eq!(series.points[1].yoy_delta, Some(3.0));
        assert!(series.diagnostics.warnings.is_empty());
    }

    #[test]
    fn warns_when_reference_never_aligns() {
        let points = points_from(start(), &[10.0, 11.0]);
        let reference = points_from(start(), &[1.0]);
        let config = SpcConfig::default().with_granularity(Granularity::Weekly);
        let series = compute_series(&points, Some(&reference), &config).expect("compute");
        assert_eq!(series.diagnostics.warnings.len(), 1);
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert_eq!(
            compute_series(&[], None, &SpcConfig::default()),
            Err(SpcError::EmptyInput)
        );

        let mut points = points_from(start(), &[1.0, 2.0, 3.0]);
        points[2].value = f64::NAN;
        assert_eq!(
            compute_series(&points, None, &SpcConfig::default()),
            Err(SpcError::NonFiniteValue { index: 2 })
        );

        let mut points = points_from(start(), &[1.0, 2.0, 3.0]);
        points[2].timestamp = points[0].timestamp;
        assert_eq!(
            compute_series(&points, None, &SpcConfig::default()),
            Err(SpcError::NonMonotonicTimestamps { index: 2 })
        );

        let points = points_from(start(), &[1.0]);
        let err = compute_series(&points, None, &SpcConfig::default().with_min_phase_size(0))
            .expect_err("invalid config must fail");
        assert!(matches!(err, SpcError::InvalidConfig(_)));
    }

    #[test]
    fn request_matches_free_function() {
        let points = points_from(start(), &[5.0, 6.0, 5.5, 6.5, 5.0, 6.0, 5.5, 6.5, 30.0]);
        let request = SeriesRequest::new(points.clone());
        assert_eq!(
            request.compute().expect("request compute"),
            compute_series(&points, None, &SpcConfig::default()).expect("compute")
        );
    }
}
