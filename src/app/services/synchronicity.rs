//! Spatial synchronicity of regulatory violations
//!
//! For a reference violation, finds the smallest radius within which a
//! majority of the nearby co-violating stations sit, scanning in fixed
//! increments up to a maximum. Distances are great-circle (haversine).
//!
//! The candidate pool contains only stations that also violated inside the
//! ±window, so the within-radius fraction is 1.0 as soon as any candidate is
//! inside. The fraction threshold stays configurable for a future
//! all-monitored-stations denominator.

use std::collections::BTreeSet;

use chrono::Duration;

use crate::app::models::ViolationEvent;
use crate::config::SynchronicityConfig;
use crate::constants::EARTH_RADIUS_KM;

/// Great-circle distance in km between two (lat, lon) points
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// One row of the synchronicity output table
#[derive(Debug, Clone, PartialEq)]
pub struct SynchronicityRecord {
    pub station: String,
    pub state: String,
    pub timestamp: chrono::NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub sc_km: f64,
}

/// Synchronicity radius of one reference violation
///
/// Considers every *other* station's violation within ±`window_hours` of the
/// reference, computes haversine distances, and walks radii from
/// `radius_step_km` to `max_radius_km`: the result is the smallest radius at
/// which the violating fraction of in-range stations is above
/// `fraction_threshold`. Returns 0.0 when no radius qualifies (in
/// particular when no other violating station is in range at all).
///
/// Events without coordinates never enter the candidate pool.
pub fn synchronicity(
    reference: &ViolationEvent,
    all_violations: &[ViolationEvent],
    config: &SynchronicityConfig,
) -> f64 {
    let (ref_lat, ref_lon) = match reference.location() {
        Some(loc) => loc,
        None => return 0.0,
    };

    let window = Duration::hours(config.window_hours);
    let lower = reference.timestamp - window;
    let upper = reference.timestamp + window;

    // Distance per candidate station; a station that violated more than once
    // inside the window counts once, at its (single) location. Station
    // identity is (state, station) since names repeat across states.
    let mut candidates: Vec<((&str, &str), f64)> = Vec::new();
    let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();
    for event in all_violations {
        if event.station == reference.station && event.state == reference.state {
            continue;
        }
        if event.timestamp < lower || event.timestamp > upper {
            continue;
        }
        let (lat, lon) = match event.location() {
            Some(loc) => loc,
            None => continue,
        };
        let key = (event.state.as_str(), event.station.as_str());
        if seen.insert(key) {
            candidates.push((key, haversine_km(ref_lat, ref_lon, lat, lon)));
        }
    }

    if candidates.is_empty() {
        return 0.0;
    }

    let steps = (config.max_radius_km / config.radius_step_km).floor() as usize;
    for step in 1..=steps {
        let radius = step as f64 * config.radius_step_km;
        let in_range = candidates.iter().filter(|(_, d)| *d <= radius).count();
        let violating_in_range = in_range;
        if in_range == 0 {
            continue;
        }
        let fraction = violating_in_range as f64 / in_range as f64;
        if fraction > config.fraction_threshold {
            return radius;
        }
    }

    0.0
}

/// Synchronicity radius for every violation in a tier's event set
pub fn synchronicity_table(
    violations: &[ViolationEvent],
    config: &SynchronicityConfig,
) -> Vec<SynchronicityRecord> {
    violations
        .iter()
        .filter_map(|event| {
            let (lat, lon) = event.location()?;
            Some(SynchronicityRecord {
                station: event.station.clone(),
                state: event.state.clone(),
                timestamp: event.timestamp,
                latitude: lat,
                longitude: lon,
                sc_km: synchronicity(event, violations, config),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::Tier;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 8, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn event(station: &str, lat: f64, lon: f64, timestamp: NaiveDateTime) -> ViolationEvent {
        ViolationEvent {
            station: station.to_string(),
            state: "SP".to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            timestamp,
            tier: Tier::Pi1,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // São Paulo to Rio de Janeiro is roughly 360 km
        let d = haversine_km(-23.5505, -46.6333, -22.9068, -43.1729);
        assert!((d - 360.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        assert!(haversine_km(-20.0, -44.0, -20.0, -44.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_other_station_in_window_gives_zero() {
        let reference = event("A", -23.55, -46.63, ts(10, 12));
        // Same station, and another station 25h away: both excluded
        let pool = vec![
            reference.clone(),
            event("A", -23.55, -46.63, ts(10, 13)),
            event("B", -23.50, -46.60, ts(11, 13)),
        ];
        let sc = synchronicity(&reference, &pool, &SynchronicityConfig::default());
        assert_eq!(sc, 0.0);
    }

    #[test]
    fn test_same_name_in_another_state_is_a_candidate() {
        let reference = event("Centro", -23.5505, -46.6333, ts(10, 12));
        // A different station that happens to share the name, ~8 km away
        let mut other = event("Centro", -23.62, -46.65, ts(10, 15));
        other.state = "MG".to_string();
        let pool = vec![reference.clone(), other];
        let sc = synchronicity(&reference, &pool, &SynchronicityConfig::default());
        assert_eq!(sc, 10.0);
    }

    #[test]
    fn test_nearby_coviolator_yields_first_covering_radius() {
        let reference = event("A", -23.5505, -46.6333, ts(10, 12));
        // ~8 km away, violating 3 hours later: first 10 km step covers it
        let pool = vec![reference.clone(), event("B", -23.62, -46.65, ts(10, 15))];
        let sc = synchronicity(&reference, &pool, &SynchronicityConfig::default());
        assert_eq!(sc, 10.0);
    }

    #[test]
    fn test_distant_coviolator_needs_larger_radius() {
        let reference = event("A", -23.5505, -46.6333, ts(10, 12));
        // Rio is ~360 km away: the scan returns the first 10 km multiple
        // at or past the distance
        let pool = vec![reference.clone(), event("B", -22.9068, -43.1729, ts(10, 12))];
        let sc = synchronicity(&reference, &pool, &SynchronicityConfig::default());
        let d = haversine_km(-23.5505, -46.6333, -22.9068, -43.1729);
        assert_eq!(sc, (d / 10.0).ceil() * 10.0);
    }

    #[test]
    fn test_beyond_max_radius_gives_zero() {
        let reference = event("A", -23.55, -46.63, ts(10, 12));
        // Manaus is ~2700 km from São Paulo, past the 1000 km cap
        let pool = vec![reference.clone(), event("B", -3.1, -60.0, ts(10, 12))];
        let sc = synchronicity(&reference, &pool, &SynchronicityConfig::default());
        assert_eq!(sc, 0.0);
    }

    #[test]
    fn test_missing_coordinates_are_skipped() {
        let reference = event("A", -23.55, -46.63, ts(10, 12));
        let mut no_coords = event("B", 0.0, 0.0, ts(10, 12));
        no_coords.latitude = None;
        no_coords.longitude = None;
        let pool = vec![reference.clone(), no_coords];
        assert_eq!(
            synchronicity(&reference, &pool, &SynchronicityConfig::default()),
            0.0
        );
    }

    #[test]
    fn test_table_has_one_row_per_located_violation() {
        let pool = vec![
            event("A", -23.5505, -46.6333, ts(10, 12)),
            event("B", -23.62, -46.65, ts(10, 15)),
        ];
        let table = synchronicity_table(&pool, &SynchronicityConfig::default());
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|row| row.sc_km == 10.0));
    }
}
