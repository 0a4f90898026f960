//! Station coordinate registry and operating-range derivation
//!
//! The coordinates file is a `;`-separated CSV with `Estacao1`, `Latitude`
//! and `Longitude` columns, where the coordinate values use comma decimal
//! separators. Stations missing from the file simply have no location; that
//! never fails a pipeline run.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::app::models::{OperatingRange, StandardizedReading, Station};
use crate::constants::columns;
use crate::{Error, Result};

/// In-memory lookup of station locations, keyed by station name
#[derive(Debug, Default)]
pub struct StationRegistry {
    stations: BTreeMap<String, Station>,
    /// Rows that could not be parsed into a usable station
    pub skipped: Vec<String>,
}

impl StationRegistry {
    /// Loads the registry from a `;`-separated coordinates CSV
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_path(path)
            .map_err(|e| Error::csv_parsing(path.display().to_string(), "cannot open coordinates file", Some(e)))?;

        let headers = reader
            .headers()
            .map_err(|e| Error::csv_parsing(path.display().to_string(), "cannot read header row", Some(e)))?
            .clone();

        let name_idx = find_column(&headers, columns::COORD_STATION)
            .ok_or_else(|| Error::missing_column(path.display().to_string(), columns::COORD_STATION))?;
        let lat_idx = find_column(&headers, columns::LATITUDE)
            .ok_or_else(|| Error::missing_column(path.display().to_string(), columns::LATITUDE))?;
        let lon_idx = find_column(&headers, columns::LONGITUDE)
            .ok_or_else(|| Error::missing_column(path.display().to_string(), columns::LONGITUDE))?;

        let mut registry = Self::default();
        for (row_number, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warn!("Skipping malformed coordinates row {}: {}", row_number + 2, e);
                    registry.skipped.push(format!("row {}: {}", row_number + 2, e));
                    continue;
                }
            };
            let name = record.get(name_idx).unwrap_or("").trim();
            if name.is_empty() {
                registry.skipped.push(format!("row {}: empty station name", row_number + 2));
                continue;
            }
            let latitude = parse_coordinate(record.get(lat_idx).unwrap_or(""));
            let longitude = parse_coordinate(record.get(lon_idx).unwrap_or(""));
            let mut station = Station {
                name: name.to_string(),
                state: String::new(),
                latitude,
                longitude,
            };
            if let Err(reason) = station.validate() {
                debug!("Station '{}' kept without location: {}", name, reason);
                station.latitude = None;
                station.longitude = None;
            }
            registry.stations.insert(name.to_string(), station);
        }

        if registry.stations.is_empty() {
            return Err(Error::station_registry(format!(
                "no stations loaded from {}",
                path.display()
            )));
        }
        debug!("Loaded {} stations from {}", registry.stations.len(), path.display());
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Station> {
        self.stations.get(name.trim())
    }

    /// Location of a station, when known and valid
    pub fn location(&self, name: &str) -> Option<(f64, f64)> {
        self.get(name).and_then(Station::location)
    }

    /// Fills in the coordinate fields of a standardized reading in place
    pub fn annotate(&self, reading: &mut StandardizedReading) {
        if let Some((lat, lon)) = self.location(&reading.station) {
            reading.latitude = Some(lat);
            reading.longitude = Some(lon);
        }
    }
}

/// Parses a coordinate written with either comma or dot decimal separator
fn parse_coordinate(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Header lookup tolerant of a UTF-8 BOM prefix on the first column
fn find_column(headers: &csv::StringRecord, wanted: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == wanted)
}

/// First and last measurement timestamps per state, station and pollutant
///
/// Readings without a resolved timestamp contribute nothing.
pub fn operating_ranges(readings: &[StandardizedReading]) -> Vec<OperatingRange> {
    let mut ranges: BTreeMap<(String, String, String), OperatingRange> = BTreeMap::new();
    for reading in readings {
        let timestamp = match reading.timestamp {
            Some(t) => t,
            None => continue,
        };
        let key = (
            reading.state.clone(),
            reading.station.clone(),
            reading.pollutant.clone(),
        );
        ranges
            .entry(key)
            .and_modify(|range| {
                if timestamp < range.first {
                    range.first = timestamp;
                }
                if timestamp > range.last {
                    range.last = timestamp;
                }
            })
            .or_insert_with(|| OperatingRange {
                station: reading.station.clone(),
                state: reading.state.clone(),
                pollutant: reading.pollutant.clone(),
                first: timestamp,
                last: timestamp,
            });
    }
    ranges.into_values().collect()
}
