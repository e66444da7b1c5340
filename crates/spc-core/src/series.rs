// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::SpcError;
use crate::diagnostics::Diagnostics;
use crate::limits::{XmrLimits, running_mean};
use chrono::NaiveDate;

/// One raw observation of a KPI.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricPoint {
    pub timestamp: NaiveDate,
    pub value: f64,
}

impl MetricPoint {
    pub fn new(timestamp: NaiveDate, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Per-point severity, ordered `None < Warning < Critical`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalState {
    #[default]
    None,
    Warning,
    Critical,
}

impl SignalState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    pub fn is_signal(self) -> bool {
        self != Self::None
    }

    /// Maximum severity over `states`; `None` for an empty iterator.
    pub fn rolled_up(states: impl IntoIterator<Item = SignalState>) -> SignalState {
        states.into_iter().max().unwrap_or_default()
    }
}

/// Out-of-control rules, in evaluation order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleId {
    /// Single point beyond the natural process limits.
    #[cfg_attr(feature = "serde", serde(rename = "beyond_3_sigma"))]
    Beyond3Sigma,
    /// Two of the last three points beyond 2 sigma on the same side.
    #[cfg_attr(feature = "serde", serde(rename = "two_of_three_beyond_2_sigma"))]
    TwoOfThreeBeyond2Sigma,
    /// Four of the last five points beyond 1 sigma on the same side.
    #[cfg_attr(feature = "serde", serde(rename = "four_of_five_beyond_1_sigma"))]
    FourOfFiveBeyond1Sigma,
    /// A full run of points on one side of the centerline.
    RunOnOneSide,
}

impl RuleId {
    pub fn number(self) -> u8 {
        match self {
            Self::Beyond3Sigma => 1,
            Self::TwoOfThreeBeyond2Sigma => 2,
            Self::FourOfFiveBeyond1Sigma => 3,
            Self::RunOnOneSide => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beyond3Sigma => "beyond_3_sigma",
            Self::TwoOfThreeBeyond2Sigma => "two_of_three_beyond_2_sigma",
            Self::FourOfFiveBeyond1Sigma => "four_of_five_beyond_1_sigma",
            Self::RunOnOneSide => "run_on_one_side",
        }
    }
}

/// A point enriched with its phase limits and classification.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichedPoint {
    pub timestamp: NaiveDate,
    pub value: f64,
    pub yoy_value: Option<f64>,
    pub yoy_delta: Option<f64>,
    pub signal_state: SignalState,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub rules: Vec<RuleId>,
    pub cl: f64,
    pub ucl: f64,
    pub lcl: f64,
    pub sigma: f64,
    pub mr_bar: f64,
    pub phase_number: u32,
    /// First point of its phase; the dashboard draws a stage marker here.
    pub phase_start: bool,
    /// Moving range against the previous point of the same phase.
    pub moving_range: Option<f64>,
    pub mr_signal: bool,
}

impl EnrichedPoint {
    pub fn metric_point(&self) -> MetricPoint {
        MetricPoint::new(self.timestamp, self.value)
    }
}

/// A maximal run of points sharing one set of control limits.
///
/// `end_index` is exclusive and `None` while the phase is still open.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Phase {
    pub phase_number: u32,
    pub start_index: usize,
    pub end_index: Option<usize>,
    pub limits: XmrLimits,
    pub provisional: bool,
    /// Rule whose sustained firing opened this phase; `None` for phase 1.
    pub opened_by: Option<RuleId>,
}

impl Phase {
    pub fn is_open(&self) -> bool {
        self.end_index.is_none()
    }

    /// Exclusive end, treating an open phase as running to `n`.
    pub fn end_or(&self, n: usize) -> usize {
        self.end_index.unwrap_or(n)
    }

    pub fn contains(&self, index: usize, n: usize) -> bool {
        index >= self.start_index && index < self.end_or(n)
    }

    pub fn len(&self, n: usize) -> usize {
        self.end_or(n).saturating_sub(self.start_index)
    }
}

/// Dashboard-facing summary of a visible window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesSummary {
    pub mean: f64,
    pub past_value: f64,
    pub past_delta: f64,
    pub signal_state: SignalState,
    pub latest_phase_number: u32,
    pub latest_phase_limits: XmrLimits,
}

impl SeriesSummary {
    /// Summarizes `points`; `None` when there is nothing to summarize.
    pub fn over(points: &[EnrichedPoint], phases: &[Phase]) -> Option<Self> {
        let last = points.last()?;
        let mean = points
            .iter()
            .enumerate()
            .fold(0.0, |mean, (i, p)| running_mean(mean, p.value, i + 1));
        let past_delta = match points.len() {
            0 | 1 => 0.0,
            n => last.value - points[n - 2].value,
        };
        let latest_phase_limits = phases
            .iter()
            .find(|phase| phase.phase_number == last.phase_number)
            .map(|phase| phase.limits)
            .unwrap_or_else(|| limits_of_point(last));

        Some(Self {
            mean,
            past_value: last.value,
            past_delta,
            signal_state: SignalState::rolled_up(points.iter().map(|p| p.signal_state)),
            latest_phase_number: last.phase_number,
            latest_phase_limits,
        })
    }
}

fn limits_of_point(point: &EnrichedPoint) -> XmrLimits {
    XmrLimits {
        cl: point.cl,
        mr_bar: point.mr_bar,
        sigma: point.sigma,
        ucl: point.ucl,
        lcl: point.lcl,
        two_sigma_upper: point.cl + 2.0 * point.sigma,
        two_sigma_lower: point.cl - 2.0 * point.sigma,
        mr_ucl: crate::limits::D4 * point.mr_bar,
    }
}

/// Enriched sequence for one (station, kpi, window) triple.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub points: Vec<EnrichedPoint>,
    pub phases: Vec<Phase>,
    pub summary: SeriesSummary,
    pub diagnostics: Diagnostics,
}

impl Series {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn signal_state(&self) -> SignalState {
        self.summary.signal_state
    }

    /// Phase containing the point at `index`.
    pub fn phase_at(&self, index: usize) -> Option<&Phase> {
        let n = self.points.len();
        self.phases.iter().find(|phase| phase.contains(index, n))
    }
}

/// Validates a point sequence: non-empty, finite, strictly increasing.
pub fn validate_points(points: &[MetricPoint]) -> Result<(), SpcError> {
    if points.is_empty() {
        return Err(SpcError::EmptyInput);
    }
    validate_sequence(points)
}

/// Validates a year-ago reference sequence; an empty one is valid.
pub fn validate_reference(points: &[MetricPoint]) -> Result<(), SpcError> {
    validate_sequence(points).map_err(|err| match err {
        SpcError::NonFiniteValue { index } => {
            SpcError::invalid_input(format!("reference value at index {index} is not finite"))
        }
        SpcError::NonMonotonicTimestamps { index } => SpcError::invalid_input(format!(
            "reference timestamps must be strictly increasing at index {index}"
        )),
        other => other,
    })
}

fn validate_sequence(points: &[MetricPoint]) -> Result<(), SpcError> {
    for (index, point) in points.iter().enumerate() {
        if !point.value.is_finite() {
            return Err(SpcError::NonFiniteValue { index });
        }
        if index > 0 && point.timestamp <= points[index - 1].timestamp {
            return Err(SpcError::NonMonotonicTimestamps { index });
        }
    }
    Ok(())
}
