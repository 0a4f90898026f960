//! Application constants for the air-quality processor
//!
//! This module contains the physical constants, canonical vocabularies and
//! default thresholds used throughout the pipeline. The values reproduce the
//! reference tables of the CONAMA 506 standardization workflow.

// =============================================================================
// Physical Constants
// =============================================================================

/// Ideal-gas molar volume at 25 °C and 1 atm, in L/mol
pub const MOLAR_VOLUME_L_PER_MOL: f64 = 24.45;

/// Mean Earth radius in km (haversine distance)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Molar masses in g/mol for the gaseous pollutants subject to unit conversion
pub mod molar_masses {
    pub const NO2: f64 = 46.0055;
    pub const O3: f64 = 48.00;
    pub const SO2: f64 = 64.066;
    pub const CO: f64 = 28.01;
    pub const NO: f64 = 30.01;
}

/// Look up the molar mass for a canonical pollutant code
pub fn molar_mass(pollutant: &str) -> Option<f64> {
    match pollutant {
        "NO2" => Some(molar_masses::NO2),
        "O3" => Some(molar_masses::O3),
        "SO2" => Some(molar_masses::SO2),
        "CO" => Some(molar_masses::CO),
        "NO" => Some(molar_masses::NO),
        _ => None,
    }
}

// =============================================================================
// Canonical Vocabularies
// =============================================================================

/// Particulate pollutant codes: never converted via molar mass, and the
/// only codes for which an mg/m³ reading is rescaled
pub const PARTICULATE_POLLUTANTS: &[&str] = &["MP10", "MP2.5"];

/// The pollutant whose standardized unit is ppm rather than µg/m³
pub const PPM_POLLUTANT: &str = "CO";

/// Collapse raw pollutant encodings onto the canonical code vocabulary
///
/// Case/format variants of PM10 map to "MP10" and the comma-decimal
/// "MP2,5" spelling used by the limits table maps to "MP2.5". Unrecognized
/// codes pass through unchanged; downstream stages may drop them.
pub fn canonical_pollutant(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed {
        "PM10" | "pm10" | "Pm10" => "MP10".to_string(),
        "MP2,5" => "MP2.5".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Canonical unit spellings
pub mod units {
    pub const MICROGRAMS_PER_M3: &str = "µg/m³";
    pub const MILLIGRAMS_PER_M3: &str = "mg/m³";
    pub const PPM: &str = "ppm";
    pub const PPB: &str = "ppb";
}

/// Severity tier labels in ascending strictness order
pub const TIER_LABELS: &[&str] = &["PI-1", "PI-2", "PI-3", "PI-4", "PF"];

/// Number of severity tiers per limits row
pub const TIER_COUNT: usize = 5;

/// Column prefix for exceedance flags in output tables
pub const EXCEED_COLUMN_PREFIX: &str = "exceed_";

// =============================================================================
// Completeness Gating Defaults
// =============================================================================

/// Minimum valid hourly samples for an hour→day rollup to count
pub const MIN_HOURS_PER_DAY: usize = 18;

/// Minimum valid daily samples for a day→month rollup to count
pub const MIN_DAYS_PER_MONTH: usize = 20;

/// Minimum series length for a trend test to be meaningful
pub const MIN_TREND_SERIES_LEN: usize = 3;

// =============================================================================
// Seasonality (Markham index) Defaults
// =============================================================================

/// Minimum samples in a station-month for it to enter the MSI computation
pub const MSI_MIN_SAMPLES_PER_MONTH: usize = 100;

/// Minimum qualifying months for a station to receive an MSI value
pub const MSI_MIN_MONTHS: usize = 6;

// =============================================================================
// Synchronicity Defaults
// =============================================================================

/// Half-width of the violation co-occurrence window, in hours
pub const SC_WINDOW_HOURS: i64 = 24;

/// Radius search step in km
pub const SC_RADIUS_STEP_KM: f64 = 10.0;

/// Maximum search radius in km
pub const SC_MAX_RADIUS_KM: f64 = 1000.0;

/// Fraction of stations that must co-violate within the radius
pub const SC_FRACTION_THRESHOLD: f64 = 0.5;

// =============================================================================
// Input / Output Column Names
// =============================================================================

/// Column names of the source tables and generated artifacts
///
/// The Portuguese names are the wire format of the state network exports and
/// are preserved in every artifact so that existing analysis notebooks keep
/// working against the standardized outputs.
pub mod columns {
    // Raw record columns
    pub const STATION: &str = "Estacao";
    pub const STATE: &str = "Estado";
    pub const POLLUTANT: &str = "Poluente";
    pub const VALUE: &str = "Valor";
    pub const UNIT: &str = "Unidade";
    pub const DATE: &str = "Data";
    pub const HOUR: &str = "Hora";

    /// The `Data` header as it appears when a UTF-8 byte-order mark was
    /// mis-decoded as Latin-1 by the upstream exporter
    pub const DATE_BOM_MANGLED: &str = "\u{ef}\u{bb}\u{bf}Data";

    // Standardized columns
    pub const STD_VALUE: &str = "Valor_Padronizado";
    pub const STD_UNIT: &str = "Unidade_Padronizada";
    pub const TIMESTAMP: &str = "Data_Hora";

    // Coordinate reference table
    pub const COORD_STATION: &str = "Estacao1";
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";

    // Limits reference table
    pub const LIMIT_POLLUTANT: &str = "Sigla";
    pub const LIMIT_PERIOD: &str = "Periodo";

    // Aggregation keys
    pub const AGG_DATE: &str = "Date";
    pub const AGG_YEAR: &str = "Year";

    // Synchronicity table
    pub const SC_KM: &str = "SC_km";
}

/// Datetime format of resolved timestamps in artifacts
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format of aggregation keys in artifacts
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Diagnostic CSV of rows whose standardized value could not be computed
pub const PROBLEM_ROWS_FILENAME: &str = "dados_problematicos.csv";

/// Diagnostic CSV of null counts grouped by pollutant and unit
pub const NULL_REPORT_FILENAME: &str = "relatorio_nulos.csv";

/// Operating date-range reference table
pub const OPERATING_RANGE_FILENAME: &str = "data_funcionamento.csv";
