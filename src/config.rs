//! Configuration management and validation.
//!
//! Provides configuration structures for the pipeline stages: synchronicity
//! search parameters, completeness gating thresholds for trend series and
//! the Markham seasonality filters. Defaults reproduce the reference values
//! in [`crate::constants`]; `validate()` rejects inconsistent overrides
//! before any data is touched.

use crate::constants;
use serde::{Deserialize, Serialize};

/// Spatial synchronicity search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynchronicityConfig {
    /// Half-width of the co-occurrence window in hours (events within
    /// ±window_hours of the reference violation are candidates)
    pub window_hours: i64,

    /// Radius search increment in km
    pub radius_step_km: f64,

    /// Largest radius to test in km
    pub max_radius_km: f64,

    /// Fraction of candidate stations that must violate within the radius
    pub fraction_threshold: f64,
}

impl Default for SynchronicityConfig {
    fn default() -> Self {
        Self {
            window_hours: constants::SC_WINDOW_HOURS,
            radius_step_km: constants::SC_RADIUS_STEP_KM,
            max_radius_km: constants::SC_MAX_RADIUS_KM,
            fraction_threshold: constants::SC_FRACTION_THRESHOLD,
        }
    }
}

impl SynchronicityConfig {
    /// Validate parameter consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.window_hours <= 0 {
            return Err(format!(
                "window_hours must be positive, got {}",
                self.window_hours
            ));
        }
        if self.radius_step_km <= 0.0 {
            return Err(format!(
                "radius_step_km must be positive, got {}",
                self.radius_step_km
            ));
        }
        if self.max_radius_km < self.radius_step_km {
            return Err(format!(
                "max_radius_km ({}) must be at least radius_step_km ({})",
                self.max_radius_km, self.radius_step_km
            ));
        }
        if !(0.0..1.0).contains(&self.fraction_threshold) {
            return Err(format!(
                "fraction_threshold must be in [0, 1), got {}",
                self.fraction_threshold
            ));
        }
        Ok(())
    }
}

/// Completeness gating for the higher-fidelity trend series
///
/// Incomplete windows are excluded entirely, never imputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessConfig {
    /// Minimum valid hourly samples for a day to enter the daily series
    pub min_hours_per_day: usize,

    /// Minimum valid daily samples for a month to enter the monthly series
    pub min_days_per_month: usize,
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self {
            min_hours_per_day: constants::MIN_HOURS_PER_DAY,
            min_days_per_month: constants::MIN_DAYS_PER_MONTH,
        }
    }
}

impl CompletenessConfig {
    /// Validate parameter consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.min_hours_per_day == 0 || self.min_hours_per_day > 24 {
            return Err(format!(
                "min_hours_per_day must be in 1..=24, got {}",
                self.min_hours_per_day
            ));
        }
        if self.min_days_per_month == 0 || self.min_days_per_month > 31 {
            return Err(format!(
                "min_days_per_month must be in 1..=31, got {}",
                self.min_days_per_month
            ));
        }
        Ok(())
    }
}

/// Markham seasonality index filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalityConfig {
    /// Minimum samples in a station-month for it to count
    pub min_samples_per_month: usize,

    /// Minimum qualifying months for a station to receive an index
    pub min_months: usize,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        Self {
            min_samples_per_month: constants::MSI_MIN_SAMPLES_PER_MONTH,
            min_months: constants::MSI_MIN_MONTHS,
        }
    }
}

impl SeasonalityConfig {
    /// Validate parameter consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.min_months == 0 || self.min_months > 12 {
            return Err(format!(
                "min_months must be in 1..=12, got {}",
                self.min_months
            ));
        }
        Ok(())
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub synchronicity: SynchronicityConfig,
    pub completeness: CompletenessConfig,
    pub seasonality: SeasonalityConfig,
}

impl Config {
    /// Validate the complete configuration
    pub fn validate(&self) -> crate::Result<()> {
        self.synchronicity
            .validate()
            .map_err(crate::Error::configuration)?;
        self.completeness
            .validate()
            .map_err(crate::Error::configuration)?;
        self.seasonality
            .validate()
            .map_err(crate::Error::configuration)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_synchronicity_validation() {
        let mut cfg = SynchronicityConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.radius_step_km = 0.0;
        assert!(cfg.validate().is_err());

        cfg.radius_step_km = 50.0;
        cfg.max_radius_km = 10.0;
        assert!(cfg.validate().is_err());

        cfg.max_radius_km = 500.0;
        cfg.fraction_threshold = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_completeness_validation() {
        let mut cfg = CompletenessConfig::default();
        assert_eq!(cfg.min_hours_per_day, 18);
        assert_eq!(cfg.min_days_per_month, 20);
        assert!(cfg.validate().is_ok());

        cfg.min_hours_per_day = 25;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_seasonality_validation() {
        let mut cfg = SeasonalityConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.min_months = 13;
        assert!(cfg.validate().is_err());
    }
}
