//! Command execution logic
//!
//! Each subcommand reads the previous stage's artifacts from disk and writes
//! its own, so the stages chain through the filesystem:
//! standardize → violations → synchronicity / trend-series / seasonality.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::models::{RawReading, StandardizedReading, Tier};
use crate::app::services::period_aggregator::Sample;
use crate::app::services::station_registry::StationRegistry;
use crate::app::services::temporal_resolver::TemporalResolver;
use crate::app::services::unit_normalizer::UnitNormalizer;
use crate::app::services::{
    dataset_io, exceedance, ingest, limits::LimitsTable, seasonality, station_registry,
    synchronicity, trend_series,
};
use crate::cli::args::{
    Args, Commands, OperatingRangeArgs, SeasonalityArgs, StandardizeArgs, SynchronicityArgs,
    TrendSeriesArgs, ViolationsArgs,
};
use crate::constants::{
    NULL_REPORT_FILENAME, OPERATING_RANGE_FILENAME, PROBLEM_ROWS_FILENAME,
};
use crate::{Error, Result};

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    /// Raw rows read (standardize) or artifact rows read (later stages)
    pub rows_read: usize,
    /// Rows carrying a standardized value and timestamp
    pub rows_standardized: usize,
    /// Rows with a null standardized value or unresolved timestamp
    pub rows_problematic: usize,
    /// Input files consumed
    pub files_read: usize,
    /// Input files skipped due to errors
    pub files_failed: usize,
    /// Aggregated values flagged on at least one tier
    pub violations: usize,
    /// Artifacts written, relative to the output location
    pub artifacts: Vec<String>,
    /// Wall-clock time of the run
    #[serde(skip)]
    pub processing_time: std::time::Duration,
}

/// Run the parsed command to completion
pub fn run(args: Args) -> Result<RunStats> {
    setup_logging(&args)?;
    let start = Instant::now();

    let command = args
        .command
        .clone()
        .ok_or_else(|| Error::configuration("no command given"))?;

    info!("Starting airq-processor");
    debug!("Command line arguments: {:?}", args);

    let mut stats = RunStats::default();
    match &command {
        Commands::Standardize(cmd) => run_standardize(&args, cmd, &mut stats)?,
        Commands::Violations(cmd) => run_violations(cmd, &mut stats)?,
        Commands::Synchronicity(cmd) => run_synchronicity(&args, cmd, &mut stats)?,
        Commands::TrendSeries(cmd) => run_trend_series(&args, cmd, &mut stats)?,
        Commands::Seasonality(cmd) => run_seasonality(&args, cmd, &mut stats)?,
        Commands::OperatingRange(cmd) => run_operating_range(cmd, &mut stats)?,
    }

    stats.processing_time = start.elapsed();
    if !args.quiet {
        print_summary(&stats);
        write_json_summary(&command, &stats)?;
    }
    Ok(stats)
}

/// Set up structured logging from the CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("airq_processor={}", args.log_level)));

    // try_init: repeated runs in one process keep the first subscriber
    if args.quiet {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init();
    }
    Ok(())
}

fn progress_bar(len: usize, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    Some(pb)
}

/// Per-pollutant Parquet artifacts in a stage directory, named by pollutant
fn pollutant_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::io(format!("cannot read directory {}", dir.display()), e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(format!("cannot read {}", dir.display()), e))?;
        let path = entry.path();
        let is_parquet = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("parquet"));
        if !is_parquet {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((stem.to_string(), path.clone()));
        }
    }
    if files.is_empty() {
        return Err(Error::configuration(format!(
            "no Parquet artifacts found in {}",
            dir.display()
        )));
    }
    files.sort();
    Ok(files)
}

fn ensure_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::io(format!("cannot create output directory {}", dir.display()), e))
}

// =============================================================================
// standardize
// =============================================================================

fn run_standardize(args: &Args, cmd: &StandardizeArgs, stats: &mut RunStats) -> Result<()> {
    let registry = cmd
        .coords
        .as_deref()
        .map(StationRegistry::load)
        .transpose()?;
    if let Some(registry) = &registry {
        info!("Loaded {} station coordinates", registry.len());
    }

    let files = ingest::scan(&cmd.input)?;
    if !args.quiet {
        println!(
            "{} {} raw files",
            "Standardizing".bright_green().bold(),
            files.len().to_string().bright_white().bold()
        );
    }

    let pb = progress_bar(files.len(), args.quiet);
    let mut ingest_stats = ingest::IngestStats::default();
    let mut raw = Vec::new();
    for file in &files {
        if let Some(pb) = &pb {
            pb.set_message(format!("{}/{}", file.state, file.path.display()));
        }
        match ingest::read_file(file, &mut ingest_stats) {
            Ok(mut rows) => {
                ingest_stats.files += 1;
                raw.append(&mut rows);
            }
            Err(e) => {
                warn!("Skipping file {}: {}", file.path.display(), e);
                ingest_stats.failed_files += 1;
            }
        }
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = &pb {
        pb.finish_with_message("Ingestion complete");
    }

    let mut normalizer = UnitNormalizer::new();
    let mut resolver = TemporalResolver::new();
    let mut problems: Vec<RawReading> = Vec::new();
    let mut by_pollutant: BTreeMap<String, Vec<StandardizedReading>> = BTreeMap::new();

    for reading in &raw {
        let mut standardized = normalizer.standardize(reading);
        standardized.timestamp = resolver.resolve(&reading.date_raw, &reading.hour_raw);
        if let Some(registry) = &registry {
            registry.annotate(&mut standardized);
        }
        if standardized.value.is_none() || standardized.timestamp.is_none() {
            problems.push(reading.clone());
        }
        by_pollutant
            .entry(standardized.pollutant.clone())
            .or_default()
            .push(standardized);
    }

    ensure_output_dir(&cmd.output)?;
    for (pollutant, rows) in &by_pollutant {
        let name = format!("{}.parquet", pollutant);
        dataset_io::write_standardized(&cmd.output.join(&name), rows)?;
        stats.artifacts.push(name);
    }
    dataset_io::write_problem_rows(&cmd.output.join(PROBLEM_ROWS_FILENAME), &problems)?;
    stats.artifacts.push(PROBLEM_ROWS_FILENAME.to_string());
    dataset_io::write_null_report(&cmd.output.join(NULL_REPORT_FILENAME), normalizer.stats())?;
    stats.artifacts.push(NULL_REPORT_FILENAME.to_string());

    info!("{}", normalizer.stats().summary());
    info!("{}", resolver.stats().summary());

    stats.rows_read = ingest_stats.rows;
    stats.rows_standardized = normalizer.stats().standardized;
    stats.rows_problematic = problems.len();
    stats.files_read = ingest_stats.files;
    stats.files_failed = ingest_stats.failed_files;
    Ok(())
}

// =============================================================================
// violations
// =============================================================================

fn run_violations(cmd: &ViolationsArgs, stats: &mut RunStats) -> Result<()> {
    let limits = LimitsTable::load(&cmd.limits)?;
    info!(
        "Loaded {} limit rows ({} skipped)",
        limits.len(),
        limits.skipped.len()
    );

    ensure_output_dir(&cmd.output)?;
    for (pollutant, path) in pollutant_files(&cmd.input)? {
        let pollutant_limits: Vec<_> = limits
            .iter()
            .filter(|l| l.pollutant == pollutant)
            .cloned()
            .collect();
        if pollutant_limits.is_empty() {
            debug!("No limits for {}, skipping", pollutant);
            continue;
        }

        let readings = dataset_io::read_standardized(&path)?;
        stats.rows_read += readings.len();

        // Per (state, station) samples, plus coordinates carried to the output.
        // Stations in different states may share a name.
        let mut samples: BTreeMap<(String, String), Vec<Sample>> = BTreeMap::new();
        let mut coords: BTreeMap<(String, String), (Option<f64>, Option<f64>)> = BTreeMap::new();
        for reading in &readings {
            if let (Some(ts), Some(value)) = (reading.timestamp, reading.value) {
                let key = (reading.state.clone(), reading.station.clone());
                samples.entry(key.clone()).or_default().push((ts, value));
                coords
                    .entry(key)
                    .or_insert((reading.latitude, reading.longitude));
            }
        }

        let mut aggregated = Vec::new();
        for ((state, station), station_samples) in &samples {
            let (latitude, longitude) = coords[&(state.clone(), station.clone())];
            for limit in &pollutant_limits {
                for (key, value) in
                    crate::app::services::period_aggregator::aggregate(station_samples, limit.period)
                {
                    let exceedances = exceedance::evaluate(value, limit);
                    aggregated.push(crate::app::models::AggregatedValue {
                        station: station.clone(),
                        state: state.clone(),
                        latitude,
                        longitude,
                        pollutant: pollutant.clone(),
                        period: limit.period,
                        key,
                        value,
                        thresholds: limit.thresholds,
                        exceedances,
                    });
                }
            }
        }

        stats.violations += aggregated.iter().filter(|v| v.is_violation()).count();
        let name = format!("{}.parquet", pollutant);
        dataset_io::write_aggregated(&cmd.output.join(&name), &aggregated)?;
        stats.artifacts.push(name);
        stats.files_read += 1;
        info!(
            "{}: {} aggregated values, {} violations",
            pollutant,
            aggregated.len(),
            aggregated.iter().filter(|v| v.is_violation()).count()
        );
    }
    Ok(())
}

// =============================================================================
// synchronicity
// =============================================================================

fn run_synchronicity(args: &Args, cmd: &SynchronicityArgs, stats: &mut RunStats) -> Result<()> {
    let config = args.synchronicity_config()?;
    ensure_output_dir(&cmd.output)?;

    for (pollutant, path) in pollutant_files(&cmd.input)? {
        let aggregated = dataset_io::read_aggregated(&path)?;
        stats.rows_read += aggregated.len();
        stats.files_read += 1;

        for tier in Tier::all() {
            let events = exceedance::violations_for_tier(&aggregated, tier);
            if events.is_empty() {
                continue;
            }
            let table = synchronicity::synchronicity_table(&events, &config);
            stats.violations += events.len();
            let name = format!("SC_{}_{}.csv", pollutant, tier.label());
            dataset_io::write_synchronicity(&cmd.output.join(&name), &table)?;
            stats.artifacts.push(name);
            info!("{} {}: {} violation events", pollutant, tier.label(), events.len());
        }
    }
    Ok(())
}

// =============================================================================
// trend-series
// =============================================================================

fn run_trend_series(args: &Args, cmd: &TrendSeriesArgs, stats: &mut RunStats) -> Result<()> {
    let config = args.completeness_config()?;
    ensure_output_dir(&cmd.output)?;

    for (pollutant, path) in pollutant_files(&cmd.input)? {
        let readings = dataset_io::read_standardized(&path)?;
        stats.rows_read += readings.len();
        stats.files_read += 1;

        let mut series_stats = trend_series::SeriesStats::default();
        let series = trend_series::monthly_series(&readings, &config, &mut series_stats);
        info!("{}: {}", pollutant, series_stats.summary());

        let name = format!("series_{}.csv", pollutant);
        dataset_io::write_monthly_series(&cmd.output.join(&name), &series)?;
        stats.artifacts.push(name);
    }
    Ok(())
}

// =============================================================================
// seasonality
// =============================================================================

fn run_seasonality(args: &Args, cmd: &SeasonalityArgs, stats: &mut RunStats) -> Result<()> {
    let config = args.seasonality_config()?;
    ensure_output_dir(&cmd.output)?;

    for (pollutant, path) in pollutant_files(&cmd.input)? {
        let readings = dataset_io::read_standardized(&path)?;
        stats.rows_read += readings.len();
        stats.files_read += 1;

        let msi = seasonality::markham_index(&readings, &config);
        let name = format!("msi_{}.csv", pollutant);
        dataset_io::write_msi(&cmd.output.join(&name), &msi)?;
        stats.artifacts.push(name);
        info!("{}: {} stations received a seasonality index", pollutant, msi.len());

        let means = seasonality::monthly_means(&readings);
        let name = format!("media_mensal_{}.csv", pollutant);
        dataset_io::write_monthly_means(&cmd.output.join(&name), &means)?;
        stats.artifacts.push(name);
    }

    if let Some(violations_dir) = &cmd.violations {
        for (pollutant, path) in pollutant_files(violations_dir)? {
            let aggregated = dataset_io::read_aggregated(&path)?;
            let counts: Vec<(Tier, [usize; 12])> = Tier::all()
                .into_iter()
                .map(|tier| {
                    let events = exceedance::violations_for_tier(&aggregated, tier);
                    (tier, seasonality::monthly_violation_counts(&events, tier))
                })
                .collect();
            let name = format!("violacoes_mensais_{}.csv", pollutant);
            dataset_io::write_monthly_violation_counts(&cmd.output.join(&name), &counts)?;
            stats.artifacts.push(name);
        }
    }
    Ok(())
}

// =============================================================================
// operating-range
// =============================================================================

fn run_operating_range(cmd: &OperatingRangeArgs, stats: &mut RunStats) -> Result<()> {
    let mut readings = Vec::new();
    for (_, path) in pollutant_files(&cmd.input)? {
        let mut rows = dataset_io::read_standardized(&path)?;
        stats.rows_read += rows.len();
        stats.files_read += 1;
        readings.append(&mut rows);
    }

    let ranges = station_registry::operating_ranges(&readings);
    info!("{} station/pollutant operating ranges", ranges.len());

    let output = if cmd.output.extension().is_some() {
        cmd.output.clone()
    } else {
        ensure_output_dir(&cmd.output)?;
        cmd.output.join(OPERATING_RANGE_FILENAME)
    };
    dataset_io::write_operating_ranges(&output, &ranges)?;
    stats.artifacts.push(output.display().to_string());
    Ok(())
}

// =============================================================================
// Reporting
// =============================================================================

fn print_summary(stats: &RunStats) {
    println!("\n{}", "Run Summary".bright_green().bold());
    println!("{}", "=".repeat(40));
    println!(
        "  Rows read:         {}",
        stats.rows_read.to_string().bright_white().bold()
    );
    if stats.rows_standardized > 0 || stats.rows_problematic > 0 {
        println!(
            "  Standardized:      {}",
            stats.rows_standardized.to_string().bright_white().bold()
        );
        println!(
            "  Problematic:       {}",
            stats.rows_problematic.to_string().bright_red().bold()
        );
    }
    println!(
        "  Files read:        {}",
        stats.files_read.to_string().bright_white().bold()
    );
    if stats.files_failed > 0 {
        println!(
            "  Files failed:      {}",
            stats.files_failed.to_string().bright_red().bold()
        );
    }
    if stats.violations > 0 {
        println!(
            "  Violations:        {}",
            stats.violations.to_string().bright_red().bold()
        );
    }
    println!(
        "  Artifacts written: {}",
        stats.artifacts.len().to_string().bright_white().bold()
    );
    println!("  Elapsed:           {}", HumanDuration(stats.processing_time));
}

/// Machine-readable run summary next to the artifacts
fn write_json_summary(command: &Commands, stats: &RunStats) -> Result<()> {
    let output = match command {
        Commands::Standardize(c) => Some(c.output.clone()),
        Commands::Violations(c) => Some(c.output.clone()),
        Commands::Synchronicity(c) => Some(c.output.clone()),
        Commands::TrendSeries(c) => Some(c.output.clone()),
        Commands::Seasonality(c) => Some(c.output.clone()),
        Commands::OperatingRange(_) => None,
    };
    if let Some(dir) = output {
        if dir.is_dir() {
            let path = dir.join("resumo.json");
            let json = serde_json::to_string_pretty(stats)
                .map_err(|e| Error::configuration(format!("cannot serialize summary: {}", e)))?;
            fs::write(&path, json)
                .map_err(|e| Error::io(format!("cannot write {}", path.display()), e))?;
            debug!("Wrote run summary to {}", path.display());
        }
    }
    Ok(())
}
