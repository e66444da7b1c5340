// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use spc_core::{
    Granularity, MetricPoint, Phase, Series, SeriesSummary, SpcConfig, SpcError,
};
use spc_online::compute_series;

/// Visible dashboard window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// Last 30 daily points.
    #[default]
    Daily,
    /// Rolling 53 weeks.
    Weekly,
}

impl WindowKind {
    pub const fn len(self) -> usize {
        match self {
            Self::Daily => 30,
            Self::Weekly => 53,
        }
    }

    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Daily => Granularity::Daily,
            Self::Weekly => Granularity::Weekly,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl std::str::FromStr for WindowKind {
    type Err = SpcError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            other => Err(SpcError::invalid_input(format!(
                "window '{other}' is unsupported; expected one of: daily, weekly"
            ))),
        }
    }
}

/// Keeps the last `kind.len()` points of a full-history series.
///
/// Phase numbers and limits are those computed over the full history. Phases
/// are clipped to the window and their indices rebased onto it; the summary is
/// recomputed over the visible points only.
pub fn window_series(series: &Series, kind: WindowKind) -> Result<Series, SpcError> {
    let n = series.len();
    if n == 0 {
        return Err(SpcError::EmptyInput);
    }
    let from = n.saturating_sub(kind.len());

    let points = series.points[from..].to_vec();
    let phases: Vec<Phase> = series
        .phases
        .iter()
        .filter(|phase| phase.start_index < n && phase.end_or(n) > from)
        .map(|phase| Phase {
            start_index: phase.start_index.saturating_sub(from),
            end_index: phase.end_index.map(|end| end - from),
            ..phase.clone()
        })
        .collect();

    let summary = SeriesSummary::over(&points, &phases).ok_or(SpcError::EmptyInput)?;
    let mut diagnostics = series.diagnostics.clone();
    if from > 0 {
        diagnostics
            .notes
            .push(format!("windowed to the last {} of {n} points", points.len()));
    }

    Ok(Series {
        points,
        phases,
        summary,
        diagnostics,
    })
}

/// Computes over the full history, then windows for display.
///
/// The YoY offset follows the window: 365 days for daily, 52 weeks for weekly.
pub fn compute_window(
    points: &[MetricPoint],
    reference_points: Option<&[MetricPoint]>,
    config: &SpcConfig,
    kind: WindowKind,
) -> Result<Series, SpcError> {
    let config = config.clone().with_granularity(kind.granularity());
    let full = compute_series(points, reference_points, &config)?;
    window_series(&full, kind)
}
