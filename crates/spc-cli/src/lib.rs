// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use spc_core::{MetricPoint, Series, SpcConfig, SpcError};
use spc_online::{SeriesCheckpoint, compute_series, compute_with_checkpoint};
use spc_rollup::{WindowKind, window_series};
use std::fs;
use std::path::Path;

/// Configuration a run computes with; a window fixes the YoY granularity.
pub fn effective_config(config: &SpcConfig, window: Option<WindowKind>) -> SpcConfig {
    match window {
        Some(kind) => config.clone().with_granularity(kind.granularity()),
        None => config.clone(),
    }
}

fn windowed(series: &Series, window: Option<WindowKind>) -> Result<Series, SpcError> {
    match window {
        Some(kind) => window_series(series, kind),
        None => Ok(series.clone()),
    }
}

/// Computes a series and optionally windows it for display.
pub fn run_compute(
    points: &[MetricPoint],
    reference_points: Option<&[MetricPoint]>,
    config: &SpcConfig,
    window: Option<WindowKind>,
) -> Result<Series, SpcError> {
    let config = effective_config(config, window);
    let series = compute_series(points, reference_points, &config)?;
    match window {
        Some(kind) => window_series(&series, kind),
        None => Ok(series),
    }
}

/// Like [`run_compute`], also returning a checkpoint built with the same
/// configuration so a later extension aligns YoY the way this run did.
pub fn run_compute_with_checkpoint(
    points: &[MetricPoint],
    reference_points: Option<&[MetricPoint]>,
    config: &SpcConfig,
    window: Option<WindowKind>,
) -> Result<(Series, SeriesCheckpoint), SpcError> {
    let config = effective_config(config, window);
    let checkpoint = compute_with_checkpoint(points, reference_points, &config)?;
    let series = windowed(checkpoint.series(), window)?;
    Ok((series, checkpoint))
}

/// Reads and deserializes a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in '{}'", path.display()))
}

/// Writes pretty JSON to `output_path`, or stdout when absent.
pub fn write_json_output<T: Serialize>(payload: &T, output_path: Option<&Path>) -> Result<()> {
    let encoded =
        serde_json::to_string_pretty(payload).context("failed to serialize JSON output")?;
    match output_path {
        Some(path) => fs::write(path, format!("{encoded}\n"))
            .with_context(|| format!("failed to write '{}'", path.display())),
        None => {
            println!("{encoded}");
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}

/// Stable machine-readable code for a CLI failure.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(spc) = err.downcast_ref::<SpcError>() {
        return match spc {
            SpcError::EmptyInput => "empty_input",
            SpcError::NonMonotonicTimestamps { .. } => "non_monotonic_timestamps",
            SpcError::NonFiniteValue { .. } => "non_finite_value",
            SpcError::LimitOverflow { .. } => "limit_overflow",
            SpcError::InvalidConfig(_) => "invalid_config",
            SpcError::InvalidInput(_) => "invalid_input",
        };
    }
    if err.downcast_ref::<serde_json::Error>().is_some() {
        return "invalid_json";
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        return "io_error";
    }
    "internal"
}

pub fn error_envelope(err: &anyhow::Error) -> ErrorEnvelope {
    ErrorEnvelope {
        error: ErrorPayload {
            code: error_code(err),
            message: format!("{err:#}"),
        },
    }
}

/// CLI namespace.
pub fn crate_name() -> &'static str {
    let _ = (
        spc_core::crate_name(),
        spc_online::crate_name(),
        spc_rollup::crate_name(),
    );
    "spc-cli"
}
