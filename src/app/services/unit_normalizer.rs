//! Unit normalization for raw monitoring records
//!
//! Maps heterogeneous raw encodings of pollutant names and concentration
//! units onto the canonical vocabulary and converts each numeric reading
//! into a standardized concentration (µg/m³) or mixing ratio (ppm for CO).
//!
//! Conversion failures are never errors: an unrecognized unit or an
//! uncoercible numeric yields a null standardized value, and every null is
//! counted grouped by (pollutant, unit) for the diagnostic report. Nulls are
//! the dominant source of data loss in the source networks and must stay
//! visible.

use std::collections::BTreeMap;

use crate::app::models::{RawReading, RawValue, StandardizedReading, Unit};
use crate::constants::{self, MOLAR_VOLUME_L_PER_MOL};

// =============================================================================
// Numeric Coercion
// =============================================================================

/// Coerce a raw textual value into a float
///
/// The state exports use comma as decimal separator and occasionally embed
/// unit suffixes or thousand separators in the value field. Cleaning keeps
/// only digits, '.', ',' and '-', turns commas into dots, and collapses any
/// dots past the first into plain digit-group joins, so "12,5.3ppm" cleans
/// to "12.53" rather than the unparseable "12.5.3".
pub fn clean_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let collapsed = if cleaned.matches('.').count() > 1 {
        let mut parts = cleaned.split('.');
        let head = parts.next().unwrap_or_default();
        let tail: String = parts.collect();
        format!("{}.{}", head, tail)
    } else {
        cleaned
    };

    collapsed.parse::<f64>().ok()
}

/// Resolve a [`RawValue`] into a float, cleaning textual values
pub fn coerce_value(value: &RawValue) -> Option<f64> {
    match value {
        RawValue::Number(v) => Some(*v),
        RawValue::Text(s) => clean_numeric(s),
        RawValue::Missing => None,
    }
}

// =============================================================================
// Unit Conversion
// =============================================================================

/// Convert a reading to the standardized unit of its pollutant
///
/// CO targets ppm; all other pollutants target µg/m³. Gaseous conversions
/// use the ideal-gas molar volume at 25 °C / 1 atm; particulates are never
/// molar-converted. Combinations outside the policy (unknown pollutant in
/// ppm, CO in mg/m³, ...) return `None`.
pub fn convert(pollutant: &str, value: f64, unit: Unit) -> Option<f64> {
    if constants::PARTICULATE_POLLUTANTS.contains(&pollutant) {
        return match unit {
            Unit::MicrogramsPerCubicMeter => Some(value),
            Unit::MilligramsPerCubicMeter => Some(value * 1000.0),
            _ => None,
        };
    }

    match Unit::target_for(pollutant) {
        Unit::Ppm => {
            // CO
            match unit {
                Unit::Ppm => Some(value),
                Unit::Ppb => Some(value / 1000.0),
                Unit::MicrogramsPerCubicMeter => constants::molar_mass(pollutant)
                    .map(|m| value * MOLAR_VOLUME_L_PER_MOL / (m * 1000.0)),
                Unit::MilligramsPerCubicMeter => None,
            }
        }
        _ => match unit {
            Unit::MicrogramsPerCubicMeter => Some(value),
            Unit::Ppm => constants::molar_mass(pollutant)
                .map(|m| value * m * 1000.0 / MOLAR_VOLUME_L_PER_MOL),
            Unit::Ppb => {
                constants::molar_mass(pollutant).map(|m| value * m / MOLAR_VOLUME_L_PER_MOL)
            }
            Unit::MilligramsPerCubicMeter => None,
        },
    }
}

// =============================================================================
// Batch Normalizer with Diagnostics
// =============================================================================

/// Null-value accounting for a normalization batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizerStats {
    /// Records seen
    pub total: usize,
    /// Records with a non-null standardized value
    pub standardized: usize,
    /// Records whose raw value failed numeric coercion
    pub unparseable_numeric: usize,
    /// Null standardized values grouped by (pollutant, unit string)
    pub nulls_by_pollutant_unit: BTreeMap<(String, String), usize>,
}

impl NormalizerStats {
    /// Total records with a null standardized value
    pub fn null_total(&self) -> usize {
        self.nulls_by_pollutant_unit.values().sum()
    }

    /// One-line batch summary for logging
    pub fn summary(&self) -> String {
        format!(
            "Standardization: {} records | {} standardized ({:.1}%) | {} null | {} unparseable numerics",
            self.total,
            self.standardized,
            if self.total == 0 {
                100.0
            } else {
                self.standardized as f64 / self.total as f64 * 100.0
            },
            self.null_total(),
            self.unparseable_numeric,
        )
    }
}

/// Stateful normalizer that accumulates diagnostics across a batch run
#[derive(Debug, Default)]
pub struct UnitNormalizer {
    stats: NormalizerStats,
}

impl UnitNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize the pollutant code, value and unit of one record
    ///
    /// Returns the canonical pollutant code, the standardized value (null if
    /// any conversion input was unrecognized) and the standardized unit.
    pub fn normalize(
        &mut self,
        pollutant_raw: &str,
        value_raw: &RawValue,
        unit_raw: &str,
    ) -> (String, Option<f64>, Unit) {
        let pollutant = constants::canonical_pollutant(pollutant_raw);
        let target = Unit::target_for(&pollutant);
        let resolved_unit = Unit::resolve(unit_raw);

        let numeric = coerce_value(value_raw);
        if numeric.is_none() && matches!(value_raw, RawValue::Text(_)) {
            self.stats.unparseable_numeric += 1;
        }

        let standardized = match (numeric, resolved_unit) {
            (Some(v), Some(u)) => convert(&pollutant, v, u),
            _ => None,
        };

        self.stats.total += 1;
        if standardized.is_some() {
            self.stats.standardized += 1;
        } else {
            let unit_key = resolved_unit
                .map(|u| u.to_string())
                .unwrap_or_else(|| unit_raw.trim().to_string());
            *self
                .stats
                .nulls_by_pollutant_unit
                .entry((pollutant.clone(), unit_key))
                .or_insert(0) += 1;
        }

        (pollutant, standardized, target)
    }

    /// Normalize a full raw reading into a standardized reading
    ///
    /// The timestamp and coordinates are left unset; the temporal resolver
    /// and the station registry fill them in.
    pub fn standardize(&mut self, raw: &RawReading) -> StandardizedReading {
        let (pollutant, value, unit) = self.normalize(&raw.pollutant, &raw.value, &raw.unit);
        let raw_unit = Unit::resolve(&raw.unit)
            .map(|u| u.to_string())
            .unwrap_or_else(|| raw.unit.trim().to_string());
        StandardizedReading {
            station: raw.station.clone(),
            state: raw.state.clone(),
            pollutant,
            raw_value: coerce_value(&raw.value),
            raw_unit,
            value,
            unit,
            timestamp: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Diagnostics accumulated so far
    pub fn stats(&self) -> &NormalizerStats {
        &self.stats
    }

    /// Consume the normalizer and return its diagnostics
    pub fn into_stats(self) -> NormalizerStats {
        self.stats
    }
}
