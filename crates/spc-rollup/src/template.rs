// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use spc_core::{EnrichedPoint, Series};

/// Prompt template the investigation trigger should use for a visible window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvestigationTemplate {
    /// Some point carries a signal: ask what caused it.
    CauseAnalysis,
    /// Nothing signalled: compare against last year.
    YearOverYear,
}

impl InvestigationTemplate {
    pub fn for_points(points: &[EnrichedPoint]) -> Self {
        if points.iter().any(|point| point.signal_state.is_signal()) {
            Self::CauseAnalysis
        } else {
            Self::YearOverYear
        }
    }

    pub fn for_series(series: &Series) -> Self {
        Self::for_points(&series.points)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CauseAnalysis => "cause_analysis",
            Self::YearOverYear => "year_over_year",
        }
    }
}
