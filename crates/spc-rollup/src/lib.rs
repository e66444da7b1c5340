// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod batch;
pub mod dashboard;
pub mod rollup;
pub mod template;
pub mod weekly;
pub mod window;
pub mod yoy;

pub use batch::compute_many;
pub use dashboard::{KpiSeries, build_kpi_series};
pub use rollup::{StationDirectory, StationSeries, SummaryLevel, roll_up_points, roll_up_series};
pub use template::InvestigationTemplate;
pub use weekly::{aggregate_to_weeks, week_start};
pub use window::{WindowKind, compute_window, window_series};
pub use yoy::{YoyPoint, align_yoy};

/// Aggregation and windowing namespace.
pub fn crate_name() -> &'static str {
    let _ = (spc_core::crate_name(), spc_online::crate_name());
    "spc-rollup"
}
