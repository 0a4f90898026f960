//! CONAMA 506/2024 regulatory limits table
//!
//! The table is a `;`-separated CSV with one row per pollutant/period pair
//! and one threshold column per tier (`PI-1` through `PF`). Threshold cells
//! that are empty or non-numeric (annual periods have no short-term limits)
//! load as `None` and never produce an exceedance.

use std::path::Path;

use tracing::{debug, warn};

use crate::app::models::{PeriodKind, RegulatoryLimit};
use crate::constants::{canonical_pollutant, columns, TIER_COUNT, TIER_LABELS};
use crate::{Error, Result};

/// The loaded limits table, in file order
#[derive(Debug, Default)]
pub struct LimitsTable {
    limits: Vec<RegulatoryLimit>,
    /// Rows dropped at load time, with the reason
    pub skipped: Vec<String>,
}

impl LimitsTable {
    /// Loads the table from a `;`-separated limits CSV
    ///
    /// Rows whose period string is not in the regulatory vocabulary are
    /// skipped with a warning rather than failing the load.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_path(path)
            .map_err(|e| Error::csv_parsing(path.display().to_string(), "cannot open limits file", Some(e)))?;

        let headers = reader
            .headers()
            .map_err(|e| Error::csv_parsing(path.display().to_string(), "cannot read header row", Some(e)))?
            .clone();

        let pollutant_idx = column_index(&headers, columns::LIMIT_POLLUTANT)
            .ok_or_else(|| Error::missing_column(path.display().to_string(), columns::LIMIT_POLLUTANT))?;
        let period_idx = column_index(&headers, columns::LIMIT_PERIOD)
            .ok_or_else(|| Error::missing_column(path.display().to_string(), columns::LIMIT_PERIOD))?;
        let mut tier_indices = [0usize; TIER_COUNT];
        for (slot, label) in tier_indices.iter_mut().zip(TIER_LABELS) {
            *slot = column_index(&headers, label)
                .ok_or_else(|| Error::missing_column(path.display().to_string(), *label))?;
        }

        let mut table = Self::default();
        for (row_number, record) in reader.records().enumerate() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    warn!("Skipping malformed limits row {}: {}", row_number + 2, e);
                    table.skipped.push(format!("row {}: {}", row_number + 2, e));
                    continue;
                }
            };

            let pollutant = canonical_pollutant(record.get(pollutant_idx).unwrap_or(""));
            if pollutant.is_empty() {
                table.skipped.push(format!("row {}: empty pollutant", row_number + 2));
                continue;
            }

            let period_raw = record.get(period_idx).unwrap_or("").trim();
            let period: PeriodKind = match period_raw.parse() {
                Ok(p) => p,
                Err(_) => {
                    warn!(
                        "Skipping limits row {}: unknown period '{}'",
                        row_number + 2,
                        period_raw
                    );
                    table
                        .skipped
                        .push(format!("row {}: unknown period '{}'", row_number + 2, period_raw));
                    continue;
                }
            };

            let mut thresholds = [None; TIER_COUNT];
            for (value, idx) in thresholds.iter_mut().zip(tier_indices) {
                *value = parse_threshold(record.get(idx).unwrap_or(""));
            }

            table.limits.push(RegulatoryLimit {
                pollutant,
                period,
                thresholds,
            });
        }

        if table.limits.is_empty() {
            return Err(Error::limits_table(
                path.display().to_string(),
                "no usable limit rows",
            ));
        }
        debug!(
            "Loaded {} limits from {} ({} rows skipped)",
            table.limits.len(),
            path.display(),
            table.skipped.len()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    /// All loaded pollutant/period limits, in file order
    pub fn iter(&self) -> impl Iterator<Item = &RegulatoryLimit> {
        self.limits.iter()
    }

    /// The limit for one pollutant/period pair, if regulated
    pub fn get(&self, pollutant: &str, period: PeriodKind) -> Option<&RegulatoryLimit> {
        let pollutant = canonical_pollutant(pollutant);
        self.limits
            .iter()
            .find(|limit| limit.pollutant == pollutant && limit.period == period)
    }
}

/// Threshold cell parse; comma decimals appear in some hand-edited tables
fn parse_threshold(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn column_index(headers: &csv::StringRecord, wanted: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim() == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::Tier;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Sigla;Periodo;PI-1;PI-2;PI-3;PI-4;PF\n";

    fn table_from(rows: &str) -> Result<LimitsTable> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        LimitsTable::load(file.path())
    }

    #[test]
    fn test_load_full_row() {
        let table = table_from("MP10;24h;120;100;75;50;45\n").unwrap();
        assert_eq!(table.len(), 1);
        let limit = table.get("MP10", PeriodKind::Daily24h).unwrap();
        assert_eq!(limit.threshold(Tier::Pi1), Some(120.0));
        assert_eq!(limit.threshold(Tier::Pf), Some(45.0));
    }

    #[test]
    fn test_non_numeric_thresholds_load_as_none() {
        let table = table_from("MP10;med. arit. anual;-;-;-;-;20\n").unwrap();
        let limit = table.get("MP10", PeriodKind::AnnualArithmeticMean).unwrap();
        assert_eq!(limit.threshold(Tier::Pi1), None);
        assert_eq!(limit.threshold(Tier::Pf), Some(20.0));
    }

    #[test]
    fn test_unknown_period_row_is_skipped_not_fatal() {
        let table = table_from("MP10;24h;120;100;75;50;45\nO3;8h rolling;;;;;100\n").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.skipped.len(), 1);
        assert!(table.skipped[0].contains("8h rolling"));
    }

    #[test]
    fn test_pollutant_aliases_are_canonicalized() {
        let table = table_from("PM10;24h;120;100;75;50;45\n").unwrap();
        assert!(table.get("MP10", PeriodKind::Daily24h).is_some());
        assert!(table.get("pm10", PeriodKind::Daily24h).is_some());
    }

    #[test]
    fn test_table_with_no_usable_rows_errors() {
        assert!(table_from("O3;mystery period;;;;;100\n").is_err());
    }

    #[test]
    fn test_comma_decimal_threshold() {
        let table = table_from("CO;max. med. mov. do dia (8h);9,5;9;9;9;9\n").unwrap();
        let limit = table.get("CO", PeriodKind::MaxMoving8hOfDay).unwrap();
        assert_eq!(limit.threshold(Tier::Pi1), Some(9.5));
    }
}
