// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::rollup::{StationDirectory, StationSeries, SummaryLevel, roll_up_points};
use crate::template::InvestigationTemplate;
use crate::window::{WindowKind, compute_window};
use spc_core::{KpiDefinition, Series, SpcConfig, SpcError};

/// One dashboard tile: a KPI at a summary level over a visible window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct KpiSeries {
    pub kpi: KpiDefinition,
    pub level: SummaryLevel,
    pub window: WindowKind,
    pub template: InvestigationTemplate,
    pub series: Series,
}

impl KpiSeries {
    /// Copy with values, YoY fields, and summary figures rounded to the KPI's
    /// display precision. Limits and classification are left untouched.
    pub fn rounded(&self) -> Self {
        let kpi = &self.kpi;
        let mut out = self.clone();
        for point in &mut out.series.points {
            point.value = kpi.round(point.value);
            point.yoy_value = point.yoy_value.map(|v| kpi.round(v));
            point.yoy_delta = point.yoy_delta.map(|v| kpi.round(v));
        }
        let summary = &mut out.series.summary;
        summary.mean = kpi.round(summary.mean);
        summary.past_value = kpi.round(summary.past_value);
        summary.past_delta = kpi.round(summary.past_delta);
        out
    }
}

/// Rolls stations up to `level`, computes over the full history, and windows.
pub fn build_kpi_series(
    level: &SummaryLevel,
    directory: &StationDirectory,
    stations: &[StationSeries],
    reference: Option<&[StationSeries]>,
    kpi: &KpiDefinition,
    config: &SpcConfig,
    window: WindowKind,
) -> Result<KpiSeries, SpcError> {
    let points = roll_up_points(level, directory, stations, kpi)?;
    let reference_points = reference
        .map(|reference| roll_up_points(level, directory, reference, kpi))
        .transpose()?;
    let series = compute_window(&points, reference_points.as_deref(), config, window)?;

    Ok(KpiSeries {
        kpi: kpi.clone(),
        level: level.clone(),
        window,
        template: InvestigationTemplate::for_series(&series),
        series,
    })
}

#[cfg(test)]
mod tests {
    use super::build_kpi_series;
    use crate::rollup::{StationDirectory, StationSeries, SummaryLevel};
    use crate::template::InvestigationTemplate;
    use crate::window::WindowKind;
    use chrono::{Days, NaiveDate};
    use spc_core::{AggKind, KpiDefinition, MetricPoint, SpcConfig};

    fn kpi() -> KpiDefinition {
        KpiDefinition {
            id: "TURN_TIME".to_string(),
            label: "Turn Time".to_string(),
            unit: "min".to_string(),
            agg: AggKind::Mean,
            goal: 45.0,
            upper_limit: 60.0,
            lower_limit: 30.0,
            decimals: 1,
        }
    }

    fn station(id: &str, start: NaiveDate, values: &[f64]) -> StationSeries {
        StationSeries::new(
            id,
            "TURN_TIME",
            values
                .iter()
                .enumerate()
                .map(|(i, &value)| {
                    let ts = start
                        .checked_add_days(Days::new(i as u64))
                        .expect("test date should be valid");
                    MetricPoint::new(ts, value)
                })
                .collect(),
        )
    }

    #[test]
    fn builds_windowed_company_tile_with_rounding() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).expect("test date should be valid");
        let a: Vec<f64> = (0..40).map(|i| 40.0 + (i % 3) as f64 * 0.33).collect();
        let b: Vec<f64> = (0..40).map(|i| 42.0 + (i % 2) as f64 * 0.21).collect();
        let stations = [station("ATL", start, &a), station("LAX", start, &b)];
        let directory = StationDirectory::new()
            .with_station("ATL", "east")
            .with_station("LAX", "west");

        let tile = build_kpi_series(
            &SummaryLevel::Company,
            &directory,
            &stations,
            None,
            &kpi(),
            &SpcConfig::default(),
            WindowKind::Daily,
        )
        .expect("tile should build");
        assert_eq!(tile.series.len(), 30);
        assert_eq!(tile.template, InvestigationTemplate::for_series(&tile.series));

        let rounded = tile.rounded();
        for (raw, shown) in tile.series.points.iter().zip(&rounded.series.points) {
            assert!((raw.value - shown.value).abs() <= 0.05 + 1e-9);
            assert_eq!(shown.value, (shown.value * 10.0).round() / 10.0);
            assert_eq!(raw.cl, shown.cl);
        }
    }
}
