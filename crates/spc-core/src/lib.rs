// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod kpi;
pub mod limits;
pub mod series;
pub mod yoy;

pub use config::{DEFAULT_MIN_PHASE_SIZE, DEFAULT_RUN_LENGTH, Granularity, SpcConfig};
pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics};
pub use error::SpcError;
pub use kpi::{AggKind, KpiDefinition};
pub use limits::{D2, D4, E2, PhaseAccumulator, Side, XmrLimits};
pub use series::{
    EnrichedPoint, MetricPoint, Phase, RuleId, Series, SeriesSummary, SignalState,
    validate_points, validate_reference,
};
pub use yoy::{YoyLookup, yoy_offset};

/// Core shared types for spc-rs.
pub fn crate_name() -> &'static str {
    "spc-core"
}
