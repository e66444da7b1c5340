// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Diagnostics schema version for series computation metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Structured diagnostics captured from a series computation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostics {
    pub n: usize,
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub phase_count: usize,
    pub shift_count: usize,
    /// Points flagged by the single-point 3 sigma rule.
    pub outlier_count: usize,
    /// Points of a still-building phase whose classification was suppressed.
    pub provisional_points: usize,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            n: 0,
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            phase_count: 0,
            shift_count: 0,
            outlier_count: 0,
            provisional_points: 0,
            notes: vec![],
            warnings: vec![],
        }
    }
}
