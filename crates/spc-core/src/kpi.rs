// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// How station values combine into region and company values.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AggKind {
    #[default]
    Mean,
    Sum,
}

impl AggKind {
    /// Combines `values`; `None` for an empty slice.
    pub fn combine(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let total: f64 = values.iter().sum();
        Some(match self {
            Self::Sum => total,
            Self::Mean => total / values.len() as f64,
        })
    }
}

/// Static KPI metadata; consumed when aggregating, never computed here.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct KpiDefinition {
    pub id: String,
    pub label: String,
    pub unit: String,
    pub agg: AggKind,
    pub goal: f64,
    pub upper_limit: f64,
    pub lower_limit: f64,
    pub decimals: u32,
}

impl KpiDefinition {
    /// Rounds a value to the KPI's display precision.
    pub fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.decimals.min(15) as i32);
        (value * scale).round() / scale
    }
}
