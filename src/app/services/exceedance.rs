//! Regulatory exceedance evaluation
//!
//! Compares aggregated values against the tiered thresholds of a limits row
//! and produces independent per-tier flags. Tiers are non-exclusive: a value
//! can exceed several simultaneously, and no "highest tier only" collapsing
//! happens here.

use crate::app::models::{AggregatedValue, PeriodKey, RegulatoryLimit, Tier, ViolationEvent};
use chrono::NaiveDate;

/// Evaluate one aggregated value against a limits row
///
/// The comparison is strict `>`: a value exactly equal to a threshold is not
/// flagged. Missing thresholds (non-numeric cells in the reference table)
/// and NaN aggregates never flag.
pub fn evaluate(value: f64, limit: &RegulatoryLimit) -> [bool; 5] {
    let mut flags = [false; 5];
    for tier in Tier::all() {
        if let Some(threshold) = limit.threshold(tier) {
            // NaN comparisons are false, so degenerate aggregates never flag
            flags[tier.index()] = value > threshold;
        }
    }
    flags
}

/// Derive the violation events of one tier from evaluated aggregates
///
/// Only aggregates keyed by a calendar date produce events: annual windows
/// carry no timestamp a co-occurrence window could be anchored to. The
/// event timestamp is midnight of the aggregation date.
pub fn violations_for_tier(aggregates: &[AggregatedValue], tier: Tier) -> Vec<ViolationEvent> {
    aggregates
        .iter()
        .filter(|agg| agg.exceedances[tier.index()])
        .filter_map(|agg| {
            let date = match agg.key {
                PeriodKey::Date(date) => date,
                PeriodKey::Year(_) => return None,
            };
            Some(ViolationEvent {
                station: agg.station.clone(),
                state: agg.state.clone(),
                latitude: agg.latitude,
                longitude: agg.longitude,
                timestamp: midnight(date),
                tier,
            })
        })
        .collect()
}

fn midnight(date: NaiveDate) -> chrono::NaiveDateTime {
    date.and_hms_opt(0, 0, 0).expect("midnight always exists")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::PeriodKind;

    fn limit(thresholds: [Option<f64>; 5]) -> RegulatoryLimit {
        RegulatoryLimit {
            pollutant: "MP10".to_string(),
            period: PeriodKind::Daily24h,
            thresholds,
        }
    }

    fn aggregate(date: NaiveDate, value: f64, exceedances: [bool; 5]) -> AggregatedValue {
        AggregatedValue {
            station: "Centro".to_string(),
            state: "MG".to_string(),
            latitude: Some(-19.9),
            longitude: Some(-43.9),
            pollutant: "MP10".to_string(),
            period: PeriodKind::Daily24h,
            key: PeriodKey::Date(date),
            value,
            thresholds: [None; 5],
            exceedances,
        }
    }

    #[test]
    fn test_strict_greater_than() {
        let limit = limit([Some(120.0), Some(100.0), Some(75.0), Some(50.0), Some(45.0)]);
        // Exactly equal to PI-1 must not flag PI-1
        let flags = evaluate(120.0, &limit);
        assert_eq!(flags, [false, true, true, true, true]);
    }

    #[test]
    fn test_multiple_tiers_flag_independently() {
        let limit = limit([Some(120.0), Some(100.0), Some(75.0), Some(50.0), Some(45.0)]);
        let flags = evaluate(80.0, &limit);
        assert_eq!(flags, [false, false, true, true, true]);
    }

    #[test]
    fn test_missing_thresholds_never_flag() {
        let limit = limit([Some(120.0), None, None, None, Some(45.0)]);
        let flags = evaluate(500.0, &limit);
        assert_eq!(flags, [true, false, false, false, true]);
    }

    #[test]
    fn test_nan_value_never_flags() {
        let limit = limit([Some(120.0), Some(100.0), Some(75.0), Some(50.0), Some(45.0)]);
        assert_eq!(evaluate(f64::NAN, &limit), [false; 5]);
    }

    #[test]
    fn test_violations_for_tier_skips_annual_keys() {
        let date = NaiveDate::from_ymd_opt(2022, 9, 14).unwrap();
        let mut annual = aggregate(date, 200.0, [true; 5]);
        annual.key = PeriodKey::Year(2022);
        let daily = aggregate(date, 200.0, [true, false, false, false, false]);

        let events = violations_for_tier(&[annual, daily.clone()], Tier::Pi1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].station, daily.station);
        assert_eq!(events[0].timestamp, date.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(events[0].tier, Tier::Pi1);

        // Tier not flagged on the daily row yields nothing
        assert!(violations_for_tier(&[daily], Tier::Pi2).is_empty());
    }
}
