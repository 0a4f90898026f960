//! Columnar artifact I/O
//!
//! Parquet carries the large tables (standardized readings, aggregated
//! values with exceedance flags); plain CSV carries the small diagnostic
//! reports. Timestamps are serialized as `%Y-%m-%d %H:%M:%S` strings so the
//! artifacts stay trivially portable across consumers.

use std::fs::File;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::debug;

use crate::app::models::{
    AggregatedValue, OperatingRange, PeriodKey, PeriodKind, RawReading, StandardizedReading, Tier,
    Unit,
};
use crate::app::services::synchronicity::SynchronicityRecord;
use crate::app::services::unit_normalizer::NormalizerStats;
use crate::constants::{columns, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::{Error, Result};

fn open_for_write(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("cannot create {}", parent.display()), e))?;
        }
    }
    File::create(path).map_err(|e| Error::io(format!("cannot create {}", path.display()), e))
}

fn write_parquet(path: &Path, mut df: DataFrame) -> Result<()> {
    let file = open_for_write(path)?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df)
        .map_err(|e| Error::columnar_io(format!("cannot write {}", path.display()), e))?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| Error::io(format!("cannot open {}", path.display()), e))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| Error::columnar_io(format!("cannot read {}", path.display()), e))
}

fn str_column<'a>(df: &'a DataFrame, path: &Path, name: &str) -> Result<&'a StringChunked> {
    df.column(name)
        .map_err(|_| Error::missing_column(path.display().to_string(), name))?
        .as_materialized_series()
        .str()
        .map_err(|e| Error::columnar_io(format!("column '{}' in {}", name, path.display()), e))
}

fn f64_column<'a>(df: &'a DataFrame, path: &Path, name: &str) -> Result<&'a Float64Chunked> {
    df.column(name)
        .map_err(|_| Error::missing_column(path.display().to_string(), name))?
        .as_materialized_series()
        .f64()
        .map_err(|e| Error::columnar_io(format!("column '{}' in {}", name, path.display()), e))
}

fn i32_column<'a>(df: &'a DataFrame, path: &Path, name: &str) -> Result<&'a Int32Chunked> {
    df.column(name)
        .map_err(|_| Error::missing_column(path.display().to_string(), name))?
        .as_materialized_series()
        .i32()
        .map_err(|e| Error::columnar_io(format!("column '{}' in {}", name, path.display()), e))
}

fn bool_column<'a>(df: &'a DataFrame, path: &Path, name: &str) -> Result<&'a BooleanChunked> {
    df.column(name)
        .map_err(|_| Error::missing_column(path.display().to_string(), name))?
        .as_materialized_series()
        .bool()
        .map_err(|e| Error::columnar_io(format!("column '{}' in {}", name, path.display()), e))
}

// =============================================================================
// Standardized Readings
// =============================================================================

/// Writes standardized readings to Parquet
pub fn write_standardized(path: &Path, readings: &[StandardizedReading]) -> Result<()> {
    let timestamps: Vec<Option<String>> = readings
        .iter()
        .map(|r| r.timestamp.map(|t| t.format(TIMESTAMP_FORMAT).to_string()))
        .collect();

    let df = df!(
        columns::STATE => readings.iter().map(|r| r.state.as_str()).collect::<Vec<_>>(),
        columns::STATION => readings.iter().map(|r| r.station.as_str()).collect::<Vec<_>>(),
        columns::POLLUTANT => readings.iter().map(|r| r.pollutant.as_str()).collect::<Vec<_>>(),
        columns::VALUE => readings.iter().map(|r| r.raw_value).collect::<Vec<_>>(),
        columns::UNIT => readings.iter().map(|r| r.raw_unit.as_str()).collect::<Vec<_>>(),
        columns::STD_VALUE => readings.iter().map(|r| r.value).collect::<Vec<_>>(),
        columns::STD_UNIT => readings.iter().map(|r| r.unit.to_string()).collect::<Vec<_>>(),
        columns::TIMESTAMP => timestamps,
        columns::LATITUDE => readings.iter().map(|r| r.latitude).collect::<Vec<_>>(),
        columns::LONGITUDE => readings.iter().map(|r| r.longitude).collect::<Vec<_>>(),
    )
    .map_err(|e| Error::columnar_io("cannot assemble standardized frame", e))?;

    write_parquet(path, df)
}

/// Reads a standardized readings Parquet back into memory
pub fn read_standardized(path: &Path) -> Result<Vec<StandardizedReading>> {
    let df = read_parquet(path)?;

    let state = str_column(&df, path, columns::STATE)?;
    let station = str_column(&df, path, columns::STATION)?;
    let pollutant = str_column(&df, path, columns::POLLUTANT)?;
    let raw_value = f64_column(&df, path, columns::VALUE)?;
    let raw_unit = str_column(&df, path, columns::UNIT)?;
    let value = f64_column(&df, path, columns::STD_VALUE)?;
    let std_unit = str_column(&df, path, columns::STD_UNIT)?;
    let timestamp = str_column(&df, path, columns::TIMESTAMP)?;
    let latitude = f64_column(&df, path, columns::LATITUDE)?;
    let longitude = f64_column(&df, path, columns::LONGITUDE)?;

    let mut readings = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let pollutant_code = pollutant.get(i).unwrap_or("").to_string();
        let unit = std_unit
            .get(i)
            .and_then(Unit::resolve)
            .unwrap_or_else(|| Unit::target_for(&pollutant_code));
        readings.push(StandardizedReading {
            station: station.get(i).unwrap_or("").to_string(),
            state: state.get(i).unwrap_or("").to_string(),
            pollutant: pollutant_code,
            raw_value: raw_value.get(i),
            raw_unit: raw_unit.get(i).unwrap_or("").to_string(),
            value: value.get(i),
            unit,
            timestamp: timestamp
                .get(i)
                .and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()),
            latitude: latitude.get(i),
            longitude: longitude.get(i),
        });
    }
    Ok(readings)
}

// =============================================================================
// Aggregated Values and Exceedance Flags
// =============================================================================

/// Writes aggregated values with limit thresholds and exceedance flags
pub fn write_aggregated(path: &Path, values: &[AggregatedValue]) -> Result<()> {
    let mut df = df!(
        columns::STATE => values.iter().map(|v| v.state.as_str()).collect::<Vec<_>>(),
        columns::STATION => values.iter().map(|v| v.station.as_str()).collect::<Vec<_>>(),
        columns::LATITUDE => values.iter().map(|v| v.latitude).collect::<Vec<_>>(),
        columns::LONGITUDE => values.iter().map(|v| v.longitude).collect::<Vec<_>>(),
        columns::POLLUTANT => values.iter().map(|v| v.pollutant.as_str()).collect::<Vec<_>>(),
        columns::LIMIT_PERIOD => values.iter().map(|v| v.period.label()).collect::<Vec<_>>(),
        columns::AGG_DATE => values
            .iter()
            .map(|v| v.key.as_date().map(|d| d.format(DATE_FORMAT).to_string()))
            .collect::<Vec<_>>(),
        columns::AGG_YEAR => values.iter().map(|v| v.key.as_year()).collect::<Vec<_>>(),
        columns::STD_VALUE => values.iter().map(|v| v.value).collect::<Vec<_>>(),
    )
    .map_err(|e| Error::columnar_io("cannot assemble aggregated frame", e))?;

    for tier in Tier::all() {
        let thresholds: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.thresholds[tier.index()])
            .collect();
        let flags: Vec<bool> = values.iter().map(|v| v.exceedances[tier.index()]).collect();
        df.with_column(Column::new(tier.label().into(), thresholds))
            .map_err(|e| Error::columnar_io("cannot add threshold column", e))?;
        df.with_column(Column::new(tier.exceed_column().into(), flags))
            .map_err(|e| Error::columnar_io("cannot add exceedance column", e))?;
    }

    write_parquet(path, df)
}

/// Reads an aggregated-values Parquet back into memory
pub fn read_aggregated(path: &Path) -> Result<Vec<AggregatedValue>> {
    let df = read_parquet(path)?;

    let state = str_column(&df, path, columns::STATE)?;
    let station = str_column(&df, path, columns::STATION)?;
    let latitude = f64_column(&df, path, columns::LATITUDE)?;
    let longitude = f64_column(&df, path, columns::LONGITUDE)?;
    let pollutant = str_column(&df, path, columns::POLLUTANT)?;
    let period = str_column(&df, path, columns::LIMIT_PERIOD)?;
    let date = str_column(&df, path, columns::AGG_DATE)?;
    let year = i32_column(&df, path, columns::AGG_YEAR)?;
    let value = f64_column(&df, path, columns::STD_VALUE)?;

    let mut threshold_cols = Vec::with_capacity(Tier::all().len());
    let mut flag_cols = Vec::with_capacity(Tier::all().len());
    for tier in Tier::all() {
        threshold_cols.push(f64_column(&df, path, tier.label())?);
        flag_cols.push(bool_column(&df, path, &tier.exceed_column())?);
    }

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let period: PeriodKind = period
            .get(i)
            .unwrap_or("")
            .parse()
            .map_err(|_| Error::data_validation(format!("bad period at row {}", i)))?;
        let key = if let Some(raw) = date.get(i) {
            PeriodKey::Date(NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
                Error::data_validation(format!("bad date '{}' at row {}", raw, i))
            })?)
        } else if let Some(y) = year.get(i) {
            PeriodKey::Year(y)
        } else {
            return Err(Error::data_validation(format!(
                "row {} has neither date nor year",
                i
            )));
        };

        let mut thresholds = [None; 5];
        let mut exceedances = [false; 5];
        for tier in Tier::all() {
            thresholds[tier.index()] = threshold_cols[tier.index()].get(i);
            exceedances[tier.index()] = flag_cols[tier.index()].get(i).unwrap_or(false);
        }

        out.push(AggregatedValue {
            station: station.get(i).unwrap_or("").to_string(),
            state: state.get(i).unwrap_or("").to_string(),
            latitude: latitude.get(i),
            longitude: longitude.get(i),
            pollutant: pollutant.get(i).unwrap_or("").to_string(),
            period,
            key,
            value: value.get(i).unwrap_or(f64::NAN),
            thresholds,
            exceedances,
        });
    }
    Ok(out)
}

// =============================================================================
// Synchronicity Table
// =============================================================================

/// Writes per-violation synchronicity radii as CSV
pub fn write_synchronicity(path: &Path, records: &[SynchronicityRecord]) -> Result<()> {
    let file = open_for_write(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([
        columns::STATION,
        columns::DATE,
        columns::LATITUDE,
        columns::LONGITUDE,
        columns::SC_KM,
        columns::STATE,
    ])?;
    for record in records {
        writer.write_record([
            record.station.clone(),
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            record.latitude.to_string(),
            record.longitude.to_string(),
            record.sc_km.to_string(),
            record.state.clone(),
        ])?;
    }
    writer.flush().map_err(|e| Error::io(format!("cannot flush {}", path.display()), e))?;
    debug!("Wrote {} synchronicity rows to {}", records.len(), path.display());
    Ok(())
}

// =============================================================================
// Diagnostic Reports
// =============================================================================

/// Rows that failed numeric coercion or timestamp resolution, for auditing
pub fn write_problem_rows(path: &Path, rows: &[RawReading]) -> Result<()> {
    let file = open_for_write(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([
        columns::STATE,
        columns::STATION,
        columns::POLLUTANT,
        columns::VALUE,
        columns::UNIT,
        columns::DATE,
        columns::HOUR,
    ])?;
    for row in rows {
        writer.write_record([
            row.state.clone(),
            row.station.clone(),
            row.pollutant.clone(),
            row.value.to_string(),
            row.unit.clone(),
            row.date_raw.clone(),
            row.hour_raw.clone(),
        ])?;
    }
    writer.flush().map_err(|e| Error::io(format!("cannot flush {}", path.display()), e))?;
    Ok(())
}

/// Null-standardization counts per pollutant/unit pair
pub fn write_null_report(path: &Path, stats: &NormalizerStats) -> Result<()> {
    let file = open_for_write(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([columns::POLLUTANT, columns::UNIT, "Nulos"])?;
    for ((pollutant, unit), count) in &stats.nulls_by_pollutant_unit {
        writer.write_record([pollutant.clone(), unit.clone(), count.to_string()])?;
    }
    writer.flush().map_err(|e| Error::io(format!("cannot flush {}", path.display()), e))?;
    Ok(())
}

/// First/last measurement timestamps per station and pollutant
pub fn write_operating_ranges(path: &Path, ranges: &[OperatingRange]) -> Result<()> {
    let file = open_for_write(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([columns::STATION, columns::STATE, columns::POLLUTANT, "Inicio", "Fim"])?;
    for range in ranges {
        writer.write_record([
            range.station.clone(),
            range.state.clone(),
            range.pollutant.clone(),
            range.first.format(TIMESTAMP_FORMAT).to_string(),
            range.last.format(TIMESTAMP_FORMAT).to_string(),
        ])?;
    }
    writer.flush().map_err(|e| Error::io(format!("cannot flush {}", path.display()), e))?;
    Ok(())
}

/// Per-station seasonality indices
pub fn write_msi(path: &Path, records: &[crate::app::services::seasonality::MsiRecord]) -> Result<()> {
    let file = open_for_write(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([columns::STATION, columns::STATE, "MSI", "Meses"])?;
    for record in records {
        writer.write_record([
            record.station.clone(),
            record.state.clone(),
            format!("{:.4}", record.msi),
            record.qualifying_months.to_string(),
        ])?;
    }
    writer.flush().map_err(|e| Error::io(format!("cannot flush {}", path.display()), e))?;
    Ok(())
}

/// Gated monthly series, one row per (station, year, month)
pub fn write_monthly_series(
    path: &Path,
    series: &[crate::app::services::trend_series::MonthlySeries],
) -> Result<()> {
    let file = open_for_write(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record([
        columns::STATION,
        columns::STATE,
        columns::POLLUTANT,
        "Ano",
        "Mes",
        columns::STD_VALUE,
    ])?;
    for entry in series {
        for ((year, month), value) in &entry.points {
            writer.write_record([
                entry.station.clone(),
                entry.state.clone(),
                entry.pollutant.clone(),
                year.to_string(),
                month.to_string(),
                value.to_string(),
            ])?;
        }
    }
    writer.flush().map_err(|e| Error::io(format!("cannot flush {}", path.display()), e))?;
    Ok(())
}

/// Violation counts per tier and calendar month
pub fn write_monthly_violation_counts(
    path: &Path,
    counts: &[(Tier, [usize; 12])],
) -> Result<()> {
    let file = open_for_write(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["Nivel", "Mes", "Violacoes"])?;
    for (tier, months) in counts {
        for (i, count) in months.iter().enumerate() {
            writer.write_record([
                tier.label().to_string(),
                (i + 1).to_string(),
                count.to_string(),
            ])?;
        }
    }
    writer.flush().map_err(|e| Error::io(format!("cannot flush {}", path.display()), e))?;
    Ok(())
}

/// Pooled monthly means, one row per calendar month with data
pub fn write_monthly_means(path: &Path, means: &[Option<f64>; 12]) -> Result<()> {
    let file = open_for_write(path)?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["Mes", columns::STD_VALUE])?;
    for (i, mean) in means.iter().enumerate() {
        if let Some(mean) = mean {
            writer.write_record([(i + 1).to_string(), mean.to_string()])?;
        }
    }
    writer.flush().map_err(|e| Error::io(format!("cannot flush {}", path.display()), e))?;
    Ok(())
}
