//! Command-line argument definitions
//!
//! The complete CLI surface using the clap derive API. Each pipeline stage
//! is a subcommand reading the previous stage's artifacts, so stages can be
//! re-run independently.

use crate::config::{CompletenessConfig, Config, SeasonalityConfig, SynchronicityConfig};
use crate::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the air quality processor
///
/// Converts raw Brazilian state monitoring network CSV exports into
/// standardized Parquet tables and derives regulatory violation, spatial
/// synchronicity, trend series and seasonality products from them.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "airq-processor",
    version,
    about = "Process Brazilian air quality monitoring data against CONAMA 506/2024 standards",
    long_about = "Processes hourly air quality measurements exported by Brazilian state \
                  monitoring networks: standardizes units and timestamps, evaluates \
                  aggregated concentrations against the CONAMA 506/2024 tiered limits, and \
                  derives spatial synchronicity, completeness-gated trend series and \
                  Markham seasonality products."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Suppress progress bars and end-of-run summaries
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,
}

/// Available pipeline stages
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Standardize raw state CSV exports into per-pollutant Parquet
    Standardize(StandardizeArgs),
    /// Aggregate standardized data and flag CONAMA limit exceedances
    Violations(ViolationsArgs),
    /// Compute spatial synchronicity radii for violation events
    Synchronicity(SynchronicityArgs),
    /// Export completeness-gated monthly series for trend testing
    TrendSeries(TrendSeriesArgs),
    /// Markham seasonality indices and monthly summaries
    Seasonality(SeasonalityArgs),
    /// First/last valid measurement per station and pollutant
    OperatingRange(OperatingRangeArgs),
}

/// Arguments for the standardize command
#[derive(Debug, Clone, Parser)]
pub struct StandardizeArgs {
    /// Raw data root: one subdirectory per state, Latin-1 CSV exports inside
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// Station coordinates CSV (';'-separated, comma-decimal coordinates)
    #[arg(short = 'c', long = "coords", value_name = "FILE")]
    pub coords: Option<PathBuf>,

    /// Output directory for per-pollutant Parquet and diagnostic CSVs
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: PathBuf,
}

/// Arguments for the violations command
#[derive(Debug, Clone, Parser)]
pub struct ViolationsArgs {
    /// Directory of standardized per-pollutant Parquet files
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// CONAMA limits CSV (';'-separated: Sigla;Periodo;PI-1..PI-4;PF)
    #[arg(short = 'l', long = "limits", value_name = "FILE")]
    pub limits: PathBuf,

    /// Output directory for per-pollutant aggregated Parquet with flags
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: PathBuf,
}

/// Arguments for the synchronicity command
#[derive(Debug, Clone, Parser)]
pub struct SynchronicityArgs {
    /// Directory of per-pollutant aggregated Parquet with exceedance flags
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory for per-pollutant, per-tier SC tables
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: PathBuf,

    /// Half-width of the temporal co-occurrence window in hours
    #[arg(long = "window-hours", value_name = "H")]
    pub window_hours: Option<i64>,

    /// Radius search step in km
    #[arg(long = "radius-step", value_name = "KM")]
    pub radius_step_km: Option<f64>,

    /// Largest radius to test in km
    #[arg(long = "max-radius", value_name = "KM")]
    pub max_radius_km: Option<f64>,
}

/// Arguments for the trend-series command
#[derive(Debug, Clone, Parser)]
pub struct TrendSeriesArgs {
    /// Directory of standardized per-pollutant Parquet files
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory for per-pollutant gated monthly series CSVs
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: PathBuf,

    /// Minimum valid hours for a day to enter the series
    #[arg(long = "min-hours", value_name = "N")]
    pub min_hours_per_day: Option<usize>,

    /// Minimum valid days for a month to enter the series
    #[arg(long = "min-days", value_name = "N")]
    pub min_days_per_month: Option<usize>,
}

/// Arguments for the seasonality command
#[derive(Debug, Clone, Parser)]
pub struct SeasonalityArgs {
    /// Directory of standardized per-pollutant Parquet files
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// Optional directory of aggregated Parquet, for monthly violation counts
    #[arg(long = "violations", value_name = "DIR")]
    pub violations: Option<PathBuf>,

    /// Output directory for MSI and monthly summary CSVs
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: PathBuf,

    /// Minimum samples in a station-month for it to count
    #[arg(long = "min-samples", value_name = "N")]
    pub min_samples_per_month: Option<usize>,

    /// Minimum qualifying months for a station to receive an index
    #[arg(long = "min-months", value_name = "N")]
    pub min_months: Option<usize>,
}

/// Arguments for the operating-range command
#[derive(Debug, Clone, Parser)]
pub struct OperatingRangeArgs {
    /// Directory of standardized per-pollutant Parquet files
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// Output CSV path
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: PathBuf,
}

impl Args {
    /// Assemble the effective configuration from defaults plus CLI overrides
    pub fn effective_config(&self) -> Result<Config> {
        let mut config = Config::default();

        match &self.command {
            Some(Commands::Synchronicity(args)) => {
                let sc = &mut config.synchronicity;
                if let Some(v) = args.window_hours {
                    sc.window_hours = v;
                }
                if let Some(v) = args.radius_step_km {
                    sc.radius_step_km = v;
                }
                if let Some(v) = args.max_radius_km {
                    sc.max_radius_km = v;
                }
            }
            Some(Commands::TrendSeries(args)) => {
                let cc = &mut config.completeness;
                if let Some(v) = args.min_hours_per_day {
                    cc.min_hours_per_day = v;
                }
                if let Some(v) = args.min_days_per_month {
                    cc.min_days_per_month = v;
                }
            }
            Some(Commands::Seasonality(args)) => {
                let sc = &mut config.seasonality;
                if let Some(v) = args.min_samples_per_month {
                    sc.min_samples_per_month = v;
                }
                if let Some(v) = args.min_months {
                    sc.min_months = v;
                }
            }
            _ => {}
        }

        config.validate()?;
        Ok(config)
    }

    /// Synchronicity parameters after overrides
    pub fn synchronicity_config(&self) -> Result<SynchronicityConfig> {
        Ok(self.effective_config()?.synchronicity)
    }

    /// Completeness gating parameters after overrides
    pub fn completeness_config(&self) -> Result<CompletenessConfig> {
        Ok(self.effective_config()?.completeness)
    }

    /// Seasonality filter parameters after overrides
    pub fn seasonality_config(&self) -> Result<SeasonalityConfig> {
        Ok(self.effective_config()?.seasonality)
    }
}
