//! Per-period aggregation of standardized station time series
//!
//! Given one station+pollutant series of (timestamp, standardized value)
//! samples, produces the derived statistic each regulatory averaging period
//! requires. Period dispatch is closed over [`PeriodKind`]; unknown periods
//! cannot reach this module because the limits loader rejects them.
//!
//! Chronological ordering within a station is a correctness precondition of
//! the rolling-window statistic, so every entry point sorts its input before
//! aggregating.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::app::models::{PeriodKey, PeriodKind};

/// One sample of a station time series
pub type Sample = (NaiveDateTime, f64);

/// Rolling window length (in samples) of the 8h moving mean
const MOVING_WINDOW: usize = 8;

/// Aggregate one station+pollutant series for a regulatory period
///
/// Returns (window key, aggregated value) pairs in chronological order. The
/// annual geometric mean of a year containing any non-positive sample is
/// NaN; callers must treat that as a reporting condition, never coerce it
/// to zero.
pub fn aggregate(samples: &[Sample], period: PeriodKind) -> Vec<(PeriodKey, f64)> {
    let sorted = sorted_by_time(samples);
    match period {
        PeriodKind::Daily24h => daily_max(&sorted),
        PeriodKind::AnnualArithmeticMean => annual_mean(&sorted),
        PeriodKind::MaxHourlyMeanOfDay => max_hourly_mean_of_day(&sorted),
        PeriodKind::MaxMoving8hOfDay => max_moving_mean_of_day(&sorted),
        PeriodKind::AnnualGeometricMean => annual_geometric_mean(&sorted),
    }
}

fn sorted_by_time(samples: &[Sample]) -> Vec<Sample> {
    let mut sorted = samples.to_vec();
    sorted.sort_by_key(|(ts, _)| *ts);
    sorted
}

/// Max of standardized values per calendar date
fn daily_max(samples: &[Sample]) -> Vec<(PeriodKey, f64)> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (ts, value) in samples {
        by_date
            .entry(ts.date())
            .and_modify(|max| *max = max.max(*value))
            .or_insert(*value);
    }
    by_date
        .into_iter()
        .map(|(date, value)| (PeriodKey::Date(date), value))
        .collect()
}

/// Arithmetic mean per calendar year
fn annual_mean(samples: &[Sample]) -> Vec<(PeriodKey, f64)> {
    let mut by_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for (ts, value) in samples {
        let entry = by_year.entry(ts.year()).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    by_year
        .into_iter()
        .map(|(year, (sum, count))| (PeriodKey::Year(year), sum / count as f64))
        .collect()
}

/// Per (date, hour) means collapsed first, then max across hours per date
fn max_hourly_mean_of_day(samples: &[Sample]) -> Vec<(PeriodKey, f64)> {
    let mut by_hour: BTreeMap<(NaiveDate, u32), (f64, usize)> = BTreeMap::new();
    for (ts, value) in samples {
        let entry = by_hour.entry((ts.date(), ts.hour())).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for ((date, _hour), (sum, count)) in by_hour {
        let mean = sum / count as f64;
        by_date
            .entry(date)
            .and_modify(|max| *max = max.max(mean))
            .or_insert(mean);
    }
    by_date
        .into_iter()
        .map(|(date, value)| (PeriodKey::Date(date), value))
        .collect()
}

/// Trailing rolling mean over the last 8 samples (min 1), then max per date
fn max_moving_mean_of_day(samples: &[Sample]) -> Vec<(PeriodKey, f64)> {
    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();

    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (i, (ts, _)) in samples.iter().enumerate() {
        let start = i.saturating_sub(MOVING_WINDOW - 1);
        let window = &values[start..=i];
        let rolling = window.iter().sum::<f64>() / window.len() as f64;
        by_date
            .entry(ts.date())
            .and_modify(|max| *max = max.max(rolling))
            .or_insert(rolling);
    }
    by_date
        .into_iter()
        .map(|(date, value)| (PeriodKey::Date(date), value))
        .collect()
}

/// Geometric mean per calendar year, NaN if any sample is non-positive
fn annual_geometric_mean(samples: &[Sample]) -> Vec<(PeriodKey, f64)> {
    let mut by_year: BTreeMap<i32, (f64, usize, bool)> = BTreeMap::new();
    for (ts, value) in samples {
        let entry = by_year.entry(ts.year()).or_insert((0.0, 0, false));
        if *value <= 0.0 {
            entry.2 = true;
        } else {
            entry.0 += value.ln();
        }
        entry.1 += 1;
    }
    by_year
        .into_iter()
        .map(|(year, (ln_sum, count, degenerate))| {
            let value = if degenerate {
                f64::NAN
            } else {
                (ln_sum / count as f64).exp()
            };
            (PeriodKey::Year(year), value)
        })
        .collect()
}

// =============================================================================
// Completeness-Gated Rollups (trend series)
// =============================================================================

/// Mean of all samples per calendar date, no completeness requirement
pub fn daily_means(samples: &[Sample]) -> Vec<(NaiveDate, f64)> {
    let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (ts, value) in samples {
        let entry = by_date.entry(ts.date()).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    by_date
        .into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect()
}

/// Hour→day rollup gated on completeness
///
/// Duplicate same-hour samples collapse to an hourly mean first; a day
/// enters the output only if it has at least `min_hours` distinct valid
/// hours. Incomplete days are excluded entirely, not imputed.
pub fn daily_means_gated(samples: &[Sample], min_hours: usize) -> Vec<(NaiveDate, f64)> {
    let mut by_hour: BTreeMap<(NaiveDate, u32), (f64, usize)> = BTreeMap::new();
    for (ts, value) in samples {
        let entry = by_hour.entry((ts.date(), ts.hour())).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for ((date, _hour), (sum, count)) in by_hour {
        let entry = by_date.entry(date).or_insert((0.0, 0));
        entry.0 += sum / count as f64;
        entry.1 += 1;
    }

    by_date
        .into_iter()
        .filter(|(_, (_, hours))| *hours >= min_hours)
        .map(|(date, (sum, hours))| (date, sum / hours as f64))
        .collect()
}

/// Day→month rollup gated on completeness
///
/// A (year, month) enters the output only if it has at least `min_days`
/// valid days in the input daily series.
pub fn monthly_means_gated(
    daily: &[(NaiveDate, f64)],
    min_days: usize,
) -> Vec<((i32, u32), f64)> {
    let mut by_month: BTreeMap<(i32, u32), (f64, usize)> = BTreeMap::new();
    for (date, value) in daily {
        let entry = by_month.entry((date.year(), date.month())).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    by_month
        .into_iter()
        .filter(|(_, (_, days))| *days >= min_days)
        .map(|(month, (sum, days))| (month, sum / days as f64))
        .collect()
}
