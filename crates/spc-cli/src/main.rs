// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spc_cli::{
    error_envelope, read_json, run_compute, run_compute_with_checkpoint, write_json_output,
};
use spc_core::{AggKind, KpiDefinition, MetricPoint, SpcConfig};
use spc_online::{extend_series, load_series_checkpoint_file, save_series_checkpoint_file};
use spc_rollup::{
    StationDirectory, StationSeries, SummaryLevel, WindowKind, aggregate_to_weeks,
    build_kpi_series,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "spc")]
#[command(about = "XmR signal detection for KPI series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute an enriched series from a JSON array of points
    Compute {
        /// Points file: [{"timestamp": "YYYY-MM-DD", "value": 1.0}, ...]
        #[arg(long)]
        input: PathBuf,

        /// Year-ago reference points
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Engine configuration (JSON); defaults apply to missing fields
        #[arg(long)]
        config: Option<PathBuf>,

        /// Window the result to the last 30 (daily) or 53 (weekly) points
        #[arg(long)]
        window: Option<WindowKind>,

        /// Also write a checkpoint that `spc extend` can continue from
        #[arg(long)]
        checkpoint_out: Option<PathBuf>,

        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Append points to a checkpointed series
    Extend {
        /// Checkpoint written by `spc compute --checkpoint-out`
        #[arg(long)]
        checkpoint: PathBuf,

        /// New points, strictly after the checkpoint's last timestamp
        #[arg(long)]
        input: PathBuf,

        /// Where to write the advanced checkpoint; overwrites --checkpoint when omitted
        #[arg(long)]
        checkpoint_out: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Roll station series up to a region or the company and compute
    Rollup {
        /// Station series file: [{"station_id", "kpi_id", "points"}, ...]
        #[arg(long)]
        input: PathBuf,

        /// KPI definition file
        #[arg(long)]
        kpi: PathBuf,

        /// company, region:<id>, or station:<id>
        #[arg(long, default_value = "company")]
        level: SummaryLevel,

        /// Station to region map: {"<station>": "<region>", ...}
        #[arg(long)]
        directory: Option<PathBuf>,

        /// Year-ago station series, same shape as --input
        #[arg(long)]
        reference: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "daily")]
        window: WindowKind,

        /// Round values to the KPI's display precision
        #[arg(long)]
        round: bool,

        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Bucket daily points into Monday-start weeks
    Weekly {
        #[arg(long)]
        input: PathBuf,

        /// mean or sum
        #[arg(long, default_value = "mean", value_parser = parse_agg)]
        agg: AggKind,

        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn parse_agg(raw: &str) -> Result<AggKind, String> {
    match raw {
        "mean" => Ok(AggKind::Mean),
        "sum" => Ok(AggKind::Sum),
        other => Err(format!("aggregation '{other}' is unsupported; expected mean or sum")),
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run(Cli::parse()) {
        match serde_json::to_string_pretty(&error_envelope(&err)) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("error: {err:#}"),
        }
        process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SpcConfig> {
    let config = match path {
        Some(path) => read_json::<SpcConfig>(path)?,
        None => SpcConfig::default(),
    };
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Compute {
            input,
            reference,
            config,
            window,
            checkpoint_out,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let points: Vec<MetricPoint> = read_json(&input)?;
            let reference: Option<Vec<MetricPoint>> =
                reference.as_deref().map(read_json).transpose()?;
            info!(points = points.len(), "computing series");

            let series = match checkpoint_out {
                Some(path) => {
                    let (series, checkpoint) =
                        run_compute_with_checkpoint(&points, reference.as_deref(), &config, window)
                            .with_context(|| format!("failed to compute '{}'", input.display()))?;
                    save_series_checkpoint_file(&path, &checkpoint).with_context(|| {
                        format!("failed to save checkpoint '{}'", path.display())
                    })?;
                    debug!(path = %path.display(), "checkpoint written");
                    series
                }
                None => run_compute(&points, reference.as_deref(), &config, window)
                    .with_context(|| format!("failed to compute '{}'", input.display()))?,
            };
            write_json_output(&series, output.as_deref())
        }
        Commands::Extend {
            checkpoint,
            input,
            checkpoint_out,
            output,
        } => {
            let restored = load_series_checkpoint_file(&checkpoint)
                .with_context(|| format!("failed to load checkpoint '{}'", checkpoint.display()))?;
            let points: Vec<MetricPoint> = read_json(&input)?;
            info!(
                existing = restored.points.len(),
                appended = points.len(),
                "extending series"
            );

            let advanced = extend_series(restored, &points)
                .with_context(|| format!("failed to extend with '{}'", input.display()))?;
            let target = checkpoint_out.unwrap_or(checkpoint);
            save_series_checkpoint_file(&target, &advanced)
                .with_context(|| format!("failed to save checkpoint '{}'", target.display()))?;
            write_json_output(advanced.series(), output.as_deref())
        }
        Commands::Rollup {
            input,
            kpi,
            level,
            directory,
            reference,
            config,
            window,
            round,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let stations: Vec<StationSeries> = read_json(&input)?;
            let kpi: KpiDefinition = read_json(&kpi)?;
            let directory: StationDirectory = match directory {
                Some(path) => read_json(&path)?,
                None => StationDirectory::new(),
            };
            let reference: Option<Vec<StationSeries>> =
                reference.as_deref().map(read_json).transpose()?;
            info!(level = %level, kpi = %kpi.id, stations = stations.len(), "rolling up");

            let tile = build_kpi_series(
                &level,
                &directory,
                &stations,
                reference.as_deref(),
                &kpi,
                &config,
                window,
            )
            .with_context(|| format!("failed to roll up {level}"))?;
            if round {
                write_json_output(&tile.rounded(), output.as_deref())
            } else {
                write_json_output(&tile, output.as_deref())
            }
        }
        Commands::Weekly { input, agg, output } => {
            let daily: Vec<MetricPoint> = read_json(&input)?;
            let weeks = aggregate_to_weeks(&daily, agg)
                .with_context(|| format!("failed to bucket '{}'", input.display()))?;
            write_json_output(&weeks, output.as_deref())
        }
    }
}
