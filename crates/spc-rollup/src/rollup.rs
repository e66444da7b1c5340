// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use spc_core::{KpiDefinition, MetricPoint, Series, SpcConfig, SpcError, validate_points};
use spc_online::compute_series;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Scope of a dashboard series.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SummaryLevel {
    Station(String),
    Region(String),
    Company,
}

impl fmt::Display for SummaryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Station(id) => write!(f, "station:{id}"),
            Self::Region(id) => write!(f, "region:{id}"),
            Self::Company => f.write_str("company"),
        }
    }
}

impl FromStr for SummaryLevel {
    type Err = SpcError;

    /// Parses `company`, `region:<id>`, or `station:<id>`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let level = match raw.split_once(':') {
            None if raw == "company" => Self::Company,
            Some(("region", id)) if !id.is_empty() => Self::Region(id.to_string()),
            Some(("station", id)) if !id.is_empty() => Self::Station(id.to_string()),
            _ => {
                return Err(SpcError::invalid_input(format!(
                    "summary level '{raw}' is unsupported; expected company, region:<id>, or station:<id>"
                )));
            }
        };
        Ok(level)
    }
}

/// Station to region membership.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StationDirectory {
    regions: BTreeMap<String, String>,
}

impl StationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_station(mut self, station: impl Into<String>, region: impl Into<String>) -> Self {
        self.insert(station, region);
        self
    }

    /// Assigns `station` to `region`, returning its previous region.
    pub fn insert(
        &mut self,
        station: impl Into<String>,
        region: impl Into<String>,
    ) -> Option<String> {
        self.regions.insert(station.into(), region.into())
    }

    pub fn region_of(&self, station: &str) -> Option<&str> {
        self.regions.get(station).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Whether `station` contributes to a series at `level`.
    pub fn includes(&self, level: &SummaryLevel, station: &str) -> bool {
        match level {
            SummaryLevel::Company => true,
            SummaryLevel::Station(id) => id == station,
            SummaryLevel::Region(region) => self.region_of(station) == Some(region.as_str()),
        }
    }
}

/// Raw points for one station and KPI.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct StationSeries {
    pub station_id: String,
    pub kpi_id: String,
    pub points: Vec<MetricPoint>,
}

impl StationSeries {
    pub fn new(
        station_id: impl Into<String>,
        kpi_id: impl Into<String>,
        points: Vec<MetricPoint>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            kpi_id: kpi_id.into(),
            points,
        }
    }
}

fn select<'a>(
    level: &SummaryLevel,
    directory: &StationDirectory,
    stations: &'a [StationSeries],
    kpi: &KpiDefinition,
) -> Result<Vec<&'a StationSeries>, SpcError> {
    let mut seen = BTreeSet::new();
    for station in stations {
        if station.kpi_id != kpi.id {
            return Err(SpcError::invalid_input(format!(
                "station '{}' carries kpi '{}' but the roll-up is for '{}'",
                station.station_id, station.kpi_id, kpi.id
            )));
        }
        if !seen.insert(station.station_id.as_str()) {
            return Err(SpcError::invalid_input(format!(
                "station '{}' appears more than once",
                station.station_id
            )));
        }
    }

    let selected: Vec<&StationSeries> = stations
        .iter()
        .filter(|station| directory.includes(level, &station.station_id))
        .collect();
    if selected.is_empty() {
        return Err(SpcError::invalid_input(format!(
            "no station contributes to {level} for kpi '{}'",
            kpi.id
        )));
    }
    Ok(selected)
}

/// Combines the selected stations' points with `kpi.agg`.
///
/// Only timestamps present in every selected station are kept, so a station
/// with a gap never skews a mean or sum.
pub fn roll_up_points(
    level: &SummaryLevel,
    directory: &StationDirectory,
    stations: &[StationSeries],
    kpi: &KpiDefinition,
) -> Result<Vec<MetricPoint>, SpcError> {
    let selected = select(level, directory, stations, kpi)?;

    let mut buckets: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for station in &selected {
        validate_points(&station.points).map_err(|err| {
            SpcError::invalid_input(format!("station '{}': {err}", station.station_id))
        })?;
        for point in &station.points {
            buckets.entry(point.timestamp).or_default().push(point.value);
        }
    }

    let total = buckets.len();
    let rolled: Vec<MetricPoint> = buckets
        .into_iter()
        .filter(|(_, values)| values.len() == selected.len())
        .filter_map(|(timestamp, values)| {
            kpi.agg
                .combine(&values)
                .map(|value| MetricPoint::new(timestamp, value))
        })
        .collect();

    if rolled.len() < total {
        debug!(
            level = %level,
            kpi = %kpi.id,
            stations = selected.len(),
            dropped = total - rolled.len(),
            "dropped timestamps not reported by every station"
        );
    }
    Ok(rolled)
}

/// Rolls stations up to `level` and computes the aggregate as an ordinary series.
///
/// Limits are recomputed on the aggregate rather than combined from stations.
pub fn roll_up_series(
    level: &SummaryLevel,
    directory: &StationDirectory,
    stations: &[StationSeries],
    reference: Option<&[StationSeries]>,
    kpi: &KpiDefinition,
    config: &SpcConfig,
) -> Result<Series, SpcError> {
    let points = roll_up_points(level, directory, stations, kpi)?;
    let reference_points = reference
        .map(|reference| roll_up_points(level, directory, reference, kpi))
        .transpose()?;
    compute_series(&points, reference_points.as_deref(), config)
}
