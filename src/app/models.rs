//! Data models for air-quality processing
//!
//! This module contains the core data structures of the standardization
//! pipeline: raw monitoring records as ingested, standardized readings,
//! station metadata, regulatory limits and the derived aggregation and
//! violation types.

use crate::constants;
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Raw Records
// =============================================================================

/// A raw concentration value as found in a source record
///
/// The branching between "already numeric" and "string that needs cleaning"
/// is resolved once at ingestion; every later stage matches on this sum type
/// instead of sniffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    /// Textual value, possibly comma-decimal with stray characters
    Text(String),
    /// Value that arrived already parsed
    Number(f64),
    /// Empty field
    Missing,
}

impl RawValue {
    /// Build from a raw CSV field
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            RawValue::Missing
        } else {
            RawValue::Text(trimmed.to_string())
        }
    }

    /// The numeric value if already parsed
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => write!(f, "{}", s),
            RawValue::Number(v) => write!(f, "{}", v),
            RawValue::Missing => Ok(()),
        }
    }
}

/// One raw hourly monitoring record, immutable once ingested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    /// Station name as reported by the state network
    pub station: String,
    /// Two-letter state code taken from the directory layout
    pub state: String,
    /// Pollutant code, already collapsed to the canonical vocabulary
    pub pollutant: String,
    /// Concentration value before numeric coercion
    pub value: RawValue,
    /// Unit string exactly as found in the source
    pub unit: String,
    /// Date field before timestamp resolution
    pub date_raw: String,
    /// Hour-of-day field, possibly the literal "24:00:00"
    pub hour_raw: String,
}

// =============================================================================
// Units
// =============================================================================

/// Canonical concentration units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    MicrogramsPerCubicMeter,
    MilligramsPerCubicMeter,
    Ppm,
    Ppb,
}

impl Unit {
    /// Resolve a raw unit string to a canonical unit
    ///
    /// The table covers the known encoding variants of the state exports,
    /// including the mojibake "Âµg/mÂ³" produced by double-decoding. Strings
    /// outside the table return `None`; the raw spelling is preserved on the
    /// reading and the standardized value stays null.
    pub fn resolve(raw: &str) -> Option<Unit> {
        match raw.trim() {
            "ug/m3" | "µg/m3" | "µg/m³" | "Âµg/mÂ³" => Some(Unit::MicrogramsPerCubicMeter),
            "mg/m3" | "mg/m³" => Some(Unit::MilligramsPerCubicMeter),
            "ppm" => Some(Unit::Ppm),
            "ppb" => Some(Unit::Ppb),
            _ => None,
        }
    }

    /// The standardized target unit for a canonical pollutant code
    ///
    /// ppm for CO, µg/m³ for everything else.
    pub fn target_for(pollutant: &str) -> Unit {
        if pollutant == constants::PPM_POLLUTANT {
            Unit::Ppm
        } else {
            Unit::MicrogramsPerCubicMeter
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Unit::MicrogramsPerCubicMeter => constants::units::MICROGRAMS_PER_M3,
            Unit::MilligramsPerCubicMeter => constants::units::MILLIGRAMS_PER_M3,
            Unit::Ppm => constants::units::PPM,
            Unit::Ppb => constants::units::PPB,
        };
        write!(f, "{}", label)
    }
}

// =============================================================================
// Standardized Records
// =============================================================================

/// A reading after unit normalization and timestamp resolution
///
/// `value` is null exactly when the conversion inputs were unrecognized:
/// either the unit string had no mapping or the raw value failed numeric
/// coercion. Null-valued readings are counted and reported, never silently
/// dropped before reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizedReading {
    pub station: String,
    pub state: String,
    /// Canonical pollutant code
    pub pollutant: String,
    /// Raw value after numeric coercion, null on coercion failure
    pub raw_value: Option<f64>,
    /// Unit string as found in the source (canonical spelling if mapped)
    pub raw_unit: String,
    /// Standardized concentration, null if conversion inputs were unrecognized
    pub value: Option<f64>,
    /// Standardized unit: ppm iff pollutant is CO, µg/m³ otherwise
    pub unit: Unit,
    /// Resolved timestamp, null if the date or hour was unparseable
    pub timestamp: Option<NaiveDateTime>,
    /// Latitude from the coordinate reference table, null on no match
    pub latitude: Option<f64>,
    /// Longitude from the coordinate reference table, null on no match
    pub longitude: Option<f64>,
}

impl StandardizedReading {
    /// Whether this reading carries both a standardized value and a timestamp
    /// and therefore participates in aggregation
    pub fn is_aggregable(&self) -> bool {
        self.value.is_some() && self.timestamp.is_some()
    }
}

// =============================================================================
// Stations
// =============================================================================

/// Station identity and geographic coordinates
///
/// Coordinates come from a left join against the reference table and may be
/// absent; downstream consumers must tolerate null coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub state: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Station {
    /// Validate coordinate ranges where coordinates are present
    pub fn validate(&self) -> Result<()> {
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(Error::data_validation(format!(
                    "Invalid latitude {} for station '{}': must be between -90 and 90",
                    lat, self.name
                )));
            }
        }
        if let Some(lon) = self.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(Error::data_validation(format!(
                    "Invalid longitude {} for station '{}': must be between -180 and 180",
                    lon, self.name
                )));
            }
        }
        if self.name.trim().is_empty() {
            return Err(Error::data_validation(
                "Station name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Both coordinates, if the reference table had a match
    pub fn location(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

// =============================================================================
// Regulatory Periods, Tiers and Limits
// =============================================================================

/// Regulatory averaging periods, closed over the CONAMA 506 vocabulary
///
/// Unknown period strings are rejected when the limits table is loaded, not
/// when rows are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodKind {
    /// Max of standardized values per calendar date
    Daily24h,
    /// Arithmetic mean per calendar year
    AnnualArithmeticMean,
    /// Per-hour means collapsed, then max across hours within each date
    MaxHourlyMeanOfDay,
    /// Trailing 8-sample rolling mean, then max within each date
    MaxMoving8hOfDay,
    /// Geometric mean per calendar year
    AnnualGeometricMean,
}

impl PeriodKind {
    /// Whether this period aggregates to calendar dates (vs years)
    pub fn is_daily(&self) -> bool {
        matches!(
            self,
            PeriodKind::Daily24h | PeriodKind::MaxHourlyMeanOfDay | PeriodKind::MaxMoving8hOfDay
        )
    }

    /// The source-vocabulary label, used in artifacts
    pub fn label(&self) -> &'static str {
        match self {
            PeriodKind::Daily24h => "24h",
            PeriodKind::AnnualArithmeticMean => "med. arit. anual",
            PeriodKind::MaxHourlyMeanOfDay => "max. med. hor. do dia (1h)",
            PeriodKind::MaxMoving8hOfDay => "max. med. mov. do dia (8h)",
            PeriodKind::AnnualGeometricMean => "med. geom. anual",
        }
    }
}

impl FromStr for PeriodKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "24h" => Ok(PeriodKind::Daily24h),
            "med. arit. anual" => Ok(PeriodKind::AnnualArithmeticMean),
            "max. med. hor. do dia (1h)" => Ok(PeriodKind::MaxHourlyMeanOfDay),
            "max. med. mov. do dia (8h)" => Ok(PeriodKind::MaxMoving8hOfDay),
            "med. geom. anual" => Ok(PeriodKind::AnnualGeometricMean),
            other => Err(Error::configuration(format!(
                "Unsupported averaging period '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Severity tiers of a regulatory limit, in ascending strictness order
///
/// PI-1 through PI-4 are the intermediate standards, PF the final standard.
/// Tiers are independent: a value may exceed several at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Pi1,
    Pi2,
    Pi3,
    Pi4,
    Pf,
}

impl Tier {
    /// All tiers in table order
    pub fn all() -> [Tier; 5] {
        [Tier::Pi1, Tier::Pi2, Tier::Pi3, Tier::Pi4, Tier::Pf]
    }

    /// Position in the limits table / exceedance flag arrays
    pub fn index(&self) -> usize {
        match self {
            Tier::Pi1 => 0,
            Tier::Pi2 => 1,
            Tier::Pi3 => 2,
            Tier::Pi4 => 3,
            Tier::Pf => 4,
        }
    }

    /// Column label as used in the reference table ("PI-1".."PI-4", "PF")
    pub fn label(&self) -> &'static str {
        constants::TIER_LABELS[self.index()]
    }

    /// Name of the boolean exceedance column for this tier
    pub fn exceed_column(&self) -> String {
        format!("{}{}", constants::EXCEED_COLUMN_PREFIX, self.label())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One row of the regulatory limits reference table
///
/// Static reference data: loaded once, never mutated. Non-numeric threshold
/// cells load as `None` and the corresponding tier is never flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryLimit {
    pub pollutant: String,
    pub period: PeriodKind,
    /// Thresholds indexed by [`Tier::index`]
    pub thresholds: [Option<f64>; 5],
}

impl RegulatoryLimit {
    /// Threshold for a specific tier
    pub fn threshold(&self, tier: Tier) -> Option<f64> {
        self.thresholds[tier.index()]
    }
}

// =============================================================================
// Aggregation Output
// =============================================================================

/// Key of an aggregation window: a calendar date or a calendar year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodKey {
    Date(NaiveDate),
    Year(i32),
}

impl PeriodKey {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            PeriodKey::Date(d) => Some(*d),
            PeriodKey::Year(_) => None,
        }
    }

    pub fn as_year(&self) -> Option<i32> {
        match self {
            PeriodKey::Date(_) => None,
            PeriodKey::Year(y) => Some(*y),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Date(d) => write!(f, "{}", d.format(constants::DATE_FORMAT)),
            PeriodKey::Year(y) => write!(f, "{}", y),
        }
    }
}

/// One aggregated value with limits attached and per-tier exceedance flags
///
/// Recomputed from scratch whenever the window's readings are reprocessed.
/// `value` may be NaN for a degenerate geometric mean; NaN never raises a
/// flag and is surfaced in the run summary instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedValue {
    pub station: String,
    pub state: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pollutant: String,
    pub period: PeriodKind,
    pub key: PeriodKey,
    pub value: f64,
    /// Tier thresholds copied from the limits row
    pub thresholds: [Option<f64>; 5],
    /// Strict `>` exceedance flags indexed by [`Tier::index`]
    pub exceedances: [bool; 5],
}

impl AggregatedValue {
    /// Whether any tier was exceeded
    pub fn is_violation(&self) -> bool {
        self.exceedances.iter().any(|&e| e)
    }
}

/// A violation derived from an aggregated value that exceeded a tier
///
/// Derived data, never mutated; regenerated on reprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub station: String,
    pub state: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: NaiveDateTime,
    pub tier: Tier,
}

impl ViolationEvent {
    /// Both coordinates, if known
    pub fn location(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Per-station operating range: first and last valid timestamp observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingRange {
    pub station: String,
    pub state: String,
    pub pollutant: String,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_reading(value: Option<f64>, ts: Option<NaiveDateTime>) -> StandardizedReading {
        StandardizedReading {
            station: "Copacabana".to_string(),
            state: "RJ".to_string(),
            pollutant: "O3".to_string(),
            raw_value: value,
            raw_unit: "µg/m³".to_string(),
            value,
            unit: Unit::MicrogramsPerCubicMeter,
            timestamp: ts,
            latitude: Some(-22.97),
            longitude: Some(-43.18),
        }
    }

    #[test]
    fn test_raw_value_from_field() {
        assert_eq!(RawValue::from_field("  "), RawValue::Missing);
        assert_eq!(
            RawValue::from_field(" 12,5 "),
            RawValue::Text("12,5".to_string())
        );
    }

    #[test]
    fn test_unit_resolution() {
        assert_eq!(Unit::resolve("ug/m3"), Some(Unit::MicrogramsPerCubicMeter));
        assert_eq!(Unit::resolve("µg/m³"), Some(Unit::MicrogramsPerCubicMeter));
        assert_eq!(
            Unit::resolve("Âµg/mÂ³"),
            Some(Unit::MicrogramsPerCubicMeter)
        );
        assert_eq!(Unit::resolve("ppm"), Some(Unit::Ppm));
        assert_eq!(Unit::resolve("ppb"), Some(Unit::Ppb));
        assert_eq!(Unit::resolve("mg/m³"), Some(Unit::MilligramsPerCubicMeter));
        assert_eq!(Unit::resolve("furlongs"), None);
    }

    #[test]
    fn test_target_unit_is_ppm_only_for_co() {
        assert_eq!(Unit::target_for("CO"), Unit::Ppm);
        assert_eq!(Unit::target_for("NO2"), Unit::MicrogramsPerCubicMeter);
        assert_eq!(Unit::target_for("MP10"), Unit::MicrogramsPerCubicMeter);
    }

    #[test]
    fn test_period_kind_parsing() {
        assert_eq!("24h".parse::<PeriodKind>().unwrap(), PeriodKind::Daily24h);
        assert_eq!(
            "med. geom. anual".parse::<PeriodKind>().unwrap(),
            PeriodKind::AnnualGeometricMean
        );
        assert_eq!(
            "max. med. mov. do dia (8h)".parse::<PeriodKind>().unwrap(),
            PeriodKind::MaxMoving8hOfDay
        );
        // Unknown kinds are configuration errors
        assert!("48h".parse::<PeriodKind>().is_err());
    }

    #[test]
    fn test_period_kind_label_round_trip() {
        for kind in [
            PeriodKind::Daily24h,
            PeriodKind::AnnualArithmeticMean,
            PeriodKind::MaxHourlyMeanOfDay,
            PeriodKind::MaxMoving8hOfDay,
            PeriodKind::AnnualGeometricMean,
        ] {
            assert_eq!(kind.label().parse::<PeriodKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_tier_labels_and_columns() {
        assert_eq!(Tier::Pi1.label(), "PI-1");
        assert_eq!(Tier::Pf.label(), "PF");
        assert_eq!(Tier::Pi3.exceed_column(), "exceed_PI-3");
        assert_eq!(Tier::all().len(), 5);
    }

    #[test]
    fn test_station_validation() {
        let mut station = Station {
            name: "Centro".to_string(),
            state: "SP".to_string(),
            latitude: Some(-23.55),
            longitude: Some(-46.63),
        };
        assert!(station.validate().is_ok());
        assert_eq!(station.location(), Some((-23.55, -46.63)));

        station.latitude = Some(95.0);
        assert!(station.validate().is_err());

        // Null coordinates are tolerated, not an error
        station.latitude = None;
        assert!(station.validate().is_ok());
        assert_eq!(station.location(), None);
    }

    #[test]
    fn test_aggregable_requires_value_and_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2021, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0);
        assert!(sample_reading(Some(12.0), ts).is_aggregable());
        assert!(!sample_reading(None, ts).is_aggregable());
        assert!(!sample_reading(Some(12.0), None).is_aggregable());
    }

    #[test]
    fn test_period_key_display() {
        let date = PeriodKey::Date(NaiveDate::from_ymd_opt(2020, 3, 7).unwrap());
        assert_eq!(date.to_string(), "2020-03-07");
        assert_eq!(PeriodKey::Year(2019).to_string(), "2019");
    }
}
