//! Completeness-gated series for external trend testing
//!
//! Builds the per-station concentration series a trend test consumes: the
//! hourly record rolls up to gated daily means, then to gated monthly
//! means. The statistical test itself lives outside this crate, behind
//! [`TrendTest`]; series shorter than the minimum testable length are never
//! handed to an implementation.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::app::models::StandardizedReading;
use crate::app::services::period_aggregator::{self, Sample};
use crate::config::CompletenessConfig;
use crate::constants::MIN_TREND_SERIES_LEN;

/// Direction verdict of a monotonic trend test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendClassification {
    Increasing,
    Decreasing,
    NoTrend,
}

/// Outcome of one trend test run over a monthly series
#[derive(Debug, Clone, PartialEq)]
pub struct TrendResult {
    pub classification: TrendClassification,
    pub p_value: f64,
    /// Sen's slope estimate, in concentration units per month
    pub slope: f64,
}

/// A monotonic trend test over an ordered series
///
/// Implementations live with the statistical tooling, not here; the pipeline
/// only guarantees the series it hands over passed completeness gating and
/// has at least the minimum testable length.
pub trait TrendTest {
    fn evaluate(&self, series: &[f64]) -> TrendResult;
}

/// Gated monthly series of one station/pollutant pair
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySeries {
    pub station: String,
    pub state: String,
    pub pollutant: String,
    /// ((year, month), mean), chronological
    pub points: Vec<((i32, u32), f64)>,
}

impl MonthlySeries {
    /// Whether the series is long enough for a trend test
    pub fn is_testable(&self) -> bool {
        self.points.len() >= MIN_TREND_SERIES_LEN
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }
}

/// Counters from one series-building run
#[derive(Debug, Default, Clone)]
pub struct SeriesStats {
    pub stations: usize,
    pub testable: usize,
    pub too_short: usize,
}

impl SeriesStats {
    pub fn summary(&self) -> String {
        format!(
            "{} station series built ({} testable, {} below {} months)",
            self.stations, self.testable, self.too_short, MIN_TREND_SERIES_LEN
        )
    }
}

/// Gated daily means per (state, station) for one pollutant's readings
///
/// Stations in different states may share a name, so the key carries both.
pub fn daily_series(
    readings: &[StandardizedReading],
    config: &CompletenessConfig,
) -> BTreeMap<(String, String), Vec<(NaiveDate, f64)>> {
    let mut samples: BTreeMap<(String, String), Vec<Sample>> = BTreeMap::new();
    for reading in readings {
        if let (Some(ts), Some(value)) = (reading.timestamp, reading.value) {
            if value.is_finite() {
                samples
                    .entry((reading.state.clone(), reading.station.clone()))
                    .or_default()
                    .push((ts, value));
            }
        }
    }
    samples
        .into_iter()
        .map(|(key, samples)| {
            let daily = period_aggregator::daily_means_gated(&samples, config.min_hours_per_day);
            (key, daily)
        })
        .filter(|(_, daily)| !daily.is_empty())
        .collect()
}

/// Hour→day→month gated rollup per (state, station), tallying into `stats`
pub fn monthly_series(
    readings: &[StandardizedReading],
    config: &CompletenessConfig,
    stats: &mut SeriesStats,
) -> Vec<MonthlySeries> {
    let mut pollutants: BTreeMap<(&str, &str), &str> = BTreeMap::new();
    for reading in readings {
        pollutants
            .entry((reading.state.as_str(), reading.station.as_str()))
            .or_insert(reading.pollutant.as_str());
    }

    let mut series = Vec::new();
    for ((state, station), daily) in daily_series(readings, config) {
        let points = period_aggregator::monthly_means_gated(&daily, config.min_days_per_month);
        if points.is_empty() {
            continue;
        }
        let pollutant = pollutants
            .get(&(state.as_str(), station.as_str()))
            .map(|p| p.to_string())
            .unwrap_or_default();
        let entry = MonthlySeries {
            station,
            state,
            pollutant,
            points,
        };
        stats.stations += 1;
        if entry.is_testable() {
            stats.testable += 1;
        } else {
            stats.too_short += 1;
        }
        series.push(entry);
    }
    series
}

/// Runs a trend test over every testable series; short series yield `None`
pub fn run_trend_test(
    series: &[MonthlySeries],
    test: &dyn TrendTest,
) -> Vec<(String, Option<TrendResult>)> {
    series
        .iter()
        .map(|s| {
            let result = s.is_testable().then(|| test.evaluate(&s.values()));
            (s.station.clone(), result)
        })
        .collect()
}
