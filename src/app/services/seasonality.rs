//! Markham seasonality index and monthly summaries
//!
//! The Markham Seasonality Index (MSI) of a station measures how unevenly a
//! pollutant's monthly mean concentrations are distributed over the year:
//! 0 means perfectly uniform, 1 means everything in a single month. It is
//! `0.5 * Σ|p_i - 1/12|` over the 12 calendar months, where `p_i` is month
//! `i`'s share of the sum of monthly means. Months a station never
//! qualified for contribute `p_i = 0`.
//!
//! Months pool across years: every January a station ever measured feeds
//! the same bucket. Station-months with too few samples are discarded, and
//! stations left with too few qualifying months receive no index.

use std::collections::BTreeMap;

use chrono::Datelike;

use crate::app::models::{StandardizedReading, Tier, ViolationEvent};
use crate::config::SeasonalityConfig;

/// MSI of one station, with the station's state for regional grouping
#[derive(Debug, Clone, PartialEq)]
pub struct MsiRecord {
    pub station: String,
    pub state: String,
    pub msi: f64,
    /// Calendar months (1-12) that passed the sample-count filter
    pub qualifying_months: usize,
}

/// Per-station Markham index over standardized hourly readings
///
/// Readings without a value, with a negative or non-finite value, or
/// without a resolved timestamp are ignored.
pub fn markham_index(
    readings: &[StandardizedReading],
    config: &SeasonalityConfig,
) -> Vec<MsiRecord> {
    // (state, station, month 1-12) -> running sum and count; the state is
    // part of the key because station names repeat across states
    let mut buckets: BTreeMap<(String, String, u32), (f64, usize)> = BTreeMap::new();

    for reading in readings {
        let value = match reading.value {
            Some(v) if v.is_finite() && v >= 0.0 => v,
            _ => continue,
        };
        let month = match reading.timestamp {
            Some(t) => t.date().month(),
            None => continue,
        };
        let entry = buckets
            .entry((reading.state.clone(), reading.station.clone(), month))
            .or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    // (state, station) -> monthly means for months that pass the sample filter
    let mut per_station: BTreeMap<(String, String), [Option<f64>; 12]> = BTreeMap::new();
    for ((state, station, month), (sum, count)) in buckets {
        if count < config.min_samples_per_month {
            continue;
        }
        per_station.entry((state, station)).or_insert([None; 12])[(month - 1) as usize] =
            Some(sum / count as f64);
    }

    let uniform = 1.0 / 12.0;
    per_station
        .into_iter()
        .filter_map(|((state, station), months)| {
            let qualifying = months.iter().flatten().count();
            if qualifying < config.min_months {
                return None;
            }
            let total: f64 = months.iter().flatten().sum();
            if total <= 0.0 {
                return None;
            }
            let msi = 0.5
                * months
                    .iter()
                    .map(|m| (m.unwrap_or(0.0) / total - uniform).abs())
                    .sum::<f64>();
            Some(MsiRecord {
                station,
                state,
                msi,
                qualifying_months: qualifying,
            })
        })
        .collect()
}

/// Mean standardized value per calendar month (1-12), pooled across years
pub fn monthly_means(readings: &[StandardizedReading]) -> [Option<f64>; 12] {
    let mut sums = [0.0f64; 12];
    let mut counts = [0usize; 12];
    for reading in readings {
        let value = match reading.value {
            Some(v) if v.is_finite() => v,
            _ => continue,
        };
        if let Some(t) = reading.timestamp {
            let idx = (t.date().month() - 1) as usize;
            sums[idx] += value;
            counts[idx] += 1;
        }
    }
    let mut means = [None; 12];
    for i in 0..12 {
        if counts[i] > 0 {
            means[i] = Some(sums[i] / counts[i] as f64);
        }
    }
    means
}

/// Violation counts per calendar month for one tier's event set
pub fn monthly_violation_counts(violations: &[ViolationEvent], tier: Tier) -> [usize; 12] {
    let mut counts = [0usize; 12];
    for event in violations {
        if event.tier != tier {
            continue;
        }
        let idx = (event.timestamp.date().month() - 1) as usize;
        counts[idx] += 1;
    }
    counts
}
