//! Air Quality Processor Library
//!
//! A Rust library for standardizing raw hourly air-quality monitoring records
//! from Brazilian state networks and evaluating CONAMA 506 regulatory
//! exceedances.
//!
//! This library provides tools for:
//! - Ingesting legacy Latin-1 CSV exports with per-state directory layouts
//! - Normalizing pollutant codes, concentration units and numeric encodings
//! - Repairing ambiguous timestamps (the `24:00:00` end-of-day convention)
//! - Aggregating station time series per regulatory averaging period
//! - Flagging per-tier threshold exceedances (PI-1..PI-4, PF)
//! - Estimating the spatial synchronicity radius of simultaneous violations
//! - Building completeness-gated series for external trend testing and
//!   computing the Markham seasonality index

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod dataset_io;
        pub mod exceedance;
        pub mod ingest;
        pub mod limits;
        pub mod period_aggregator;
        pub mod seasonality;
        pub mod station_registry;
        pub mod synchronicity;
        pub mod temporal_resolver;
        pub mod trend_series;
        pub mod unit_normalizer;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{PeriodKind, RawReading, RawValue, StandardizedReading, Station, Tier, Unit};
pub use config::Config;

/// Result type alias for the air-quality processor
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for air-quality processing operations
///
/// Per-record problems (unparseable numerics, unknown units, broken
/// timestamps) are *not* errors: they degrade to null values tracked by the
/// per-stage statistics. These variants cover failures that genuinely stop
/// an operation, such as missing files or malformed reference tables.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error
    #[error("CSV parsing error in file '{file}': {message}")]
    CsvParsing {
        file: String,
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    /// Required column missing from an input table
    #[error("Missing column '{column}' in file '{file}'")]
    MissingColumn { file: String, column: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Station registry error
    #[error("Station registry error: {message}")]
    StationRegistry { message: String },

    /// Regulatory limits table error
    #[error("Regulatory limits error in '{file}': {message}")]
    LimitsTable { file: String, message: String },

    /// Data validation error
    #[error("Data validation error: {message}")]
    DataValidation { message: String },

    /// Columnar (Parquet/CSV artifact) I/O error
    #[error("Columnar I/O error: {message}")]
    ColumnarIo {
        message: String,
        #[source]
        source: polars::error::PolarsError,
    },

    /// Raw data directory not found or empty
    #[error("Raw data directory problem: {path}: {message}")]
    RawDataLayout { path: String, message: String },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a CSV parsing error with context
    pub fn csv_parsing(
        file: impl Into<String>,
        message: impl Into<String>,
        source: Option<csv::Error>,
    ) -> Self {
        Self::CsvParsing {
            file: file.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a missing column error
    pub fn missing_column(file: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            file: file.into(),
            column: column.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a station registry error
    pub fn station_registry(message: impl Into<String>) -> Self {
        Self::StationRegistry {
            message: message.into(),
        }
    }

    /// Create a regulatory limits table error
    pub fn limits_table(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LimitsTable {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a data validation error
    pub fn data_validation(message: impl Into<String>) -> Self {
        Self::DataValidation {
            message: message.into(),
        }
    }

    /// Create a columnar I/O error
    pub fn columnar_io(message: impl Into<String>, source: polars::error::PolarsError) -> Self {
        Self::ColumnarIo {
            message: message.into(),
            source,
        }
    }

    /// Create a raw data layout error
    pub fn raw_data_layout(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RawDataLayout {
            path: path.into(),
            message: message.into(),
        }
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::CsvParsing {
            file: "unknown".to_string(),
            message: "CSV parsing failed".to_string(),
            source: Some(error),
        }
    }
}

impl From<polars::error::PolarsError> for Error {
    fn from(error: polars::error::PolarsError) -> Self {
        Self::ColumnarIo {
            message: "columnar operation failed".to_string(),
            source: error,
        }
    }
}
