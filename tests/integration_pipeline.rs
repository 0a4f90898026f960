//! End-to-end pipeline tests over synthetic state exports
//!
//! Builds a small Latin-1 raw tree with the quirks the real state exports
//! have (comma decimals, ppb units, "24:00:00" hours, a BOM-mangled date
//! header) and runs it through ingestion, standardization, Parquet round
//! trips, aggregation and exceedance flagging.

use std::fs;

use chrono::NaiveDate;
use tempfile::TempDir;

use airq_processor::app::models::{PeriodKey, PeriodKind, Tier, Unit};
use airq_processor::app::services::period_aggregator::{aggregate, Sample};
use airq_processor::app::services::station_registry::StationRegistry;
use airq_processor::app::services::temporal_resolver::TemporalResolver;
use airq_processor::app::services::unit_normalizer::UnitNormalizer;
use airq_processor::app::services::{dataset_io, exceedance, ingest, limits::LimitsTable};

const RAW_HEADER: &str = "Data,Hora,Estacao,Poluente,Valor,Unidade\n";

/// A raw tree with one SP file exercising the ingestion quirks
fn build_raw_tree() -> TempDir {
    let root = TempDir::new().unwrap();
    let sp = root.path().join("SP");
    fs::create_dir_all(&sp).unwrap();

    let mut content = RAW_HEADER.as_bytes().to_vec();
    // Quoted comma-decimal O3 value in µg/m³ (Latin-1 bytes for µ and ³)
    content.extend_from_slice(b"2022-03-01,13:00,Centro,O3,\"80,5\",\xB5g/m\xB3\n");
    // CO arrives in ppb and must scale to ppm
    content.extend_from_slice(b"2022-03-01,14:00,Centro,CO,9000,ppb\n");
    // End-of-day hour must roll to the next date
    content.extend_from_slice(b"2022-03-01,24:00:00,Centro,O3,60,\xB5g/m\xB3\n");
    // Unparseable value becomes a counted null
    content.extend_from_slice(b"2022-03-02,01:00,Centro,O3,n/d,\xB5g/m\xB3\n");
    fs::write(sp.join("export.csv"), content).unwrap();
    root
}

#[test]
fn test_raw_tree_to_standardized_parquet() {
    let raw_root = build_raw_tree();
    let files = ingest::scan(raw_root.path()).unwrap();
    let (raw, ingest_stats) = ingest::read_all(&files);
    assert_eq!(ingest_stats.rows, 4);
    assert_eq!(ingest_stats.states, 1);

    let coords = TempDir::new().unwrap();
    let coords_path = coords.path().join("coords.csv");
    fs::write(&coords_path, "Estacao1;Latitude;Longitude\nCentro;-23,5505;-46,6333\n").unwrap();
    let registry = StationRegistry::load(&coords_path).unwrap();

    let mut normalizer = UnitNormalizer::new();
    let mut resolver = TemporalResolver::new();
    let mut standardized = Vec::new();
    for reading in &raw {
        let mut row = normalizer.standardize(reading);
        row.timestamp = resolver.resolve(&reading.date_raw, &reading.hour_raw);
        registry.annotate(&mut row);
        standardized.push(row);
    }

    // Comma decimal parsed, unit already standardized for O3
    let o3 = &standardized[0];
    assert_eq!(o3.pollutant, "O3");
    assert_eq!(o3.value, Some(80.5));
    assert_eq!(o3.unit, Unit::MicrogramsPerCubicMeter);
    assert_eq!(o3.latitude, Some(-23.5505));

    // CO in ppb scales to ppm
    let co = &standardized[1];
    assert_eq!(co.pollutant, "CO");
    assert_eq!(co.value, Some(9.0));
    assert_eq!(co.unit, Unit::Ppm);

    // 24:00:00 rolled over to March 2nd midnight
    let rollover = &standardized[2];
    assert_eq!(
        rollover.timestamp,
        NaiveDate::from_ymd_opt(2022, 3, 2).unwrap().and_hms_opt(0, 0, 0)
    );

    // The unparseable value is a counted null, not a dropped row
    let null_row = &standardized[3];
    assert_eq!(null_row.value, None);
    assert_eq!(normalizer.stats().null_total(), 1);

    // Survives a Parquet round trip intact
    let out = TempDir::new().unwrap();
    let path = out.path().join("O3.parquet");
    dataset_io::write_standardized(&path, &standardized).unwrap();
    let restored = dataset_io::read_standardized(&path).unwrap();
    assert_eq!(restored, standardized);
}

#[test]
fn test_bom_mangled_header_is_tolerated() {
    let root = TempDir::new().unwrap();
    let mg = root.path().join("MG");
    fs::create_dir_all(&mg).unwrap();
    fs::write(
        mg.join("export.csv"),
        b"\xEF\xBB\xBFData,Data,Hora,Estacao,Poluente,Valor,Unidade\n2021-06-10,,08:00,Praca,MP10,33,ug/m3\n",
    )
    .unwrap();

    let files = ingest::scan(root.path()).unwrap();
    let (raw, _) = ingest::read_all(&files);
    assert_eq!(raw.len(), 1);
    assert_eq!(raw[0].date_raw, "2021-06-10");
    assert_eq!(raw[0].state, "MG");
}

#[test]
fn test_violation_flags_from_limits_table() {
    let dir = TempDir::new().unwrap();
    let limits_path = dir.path().join("limits.csv");
    fs::write(
        &limits_path,
        "Sigla;Periodo;PI-1;PI-2;PI-3;PI-4;PF\nMP10;24h;120;100;75;50;45\nMP10;med. arit. anual;40;35;30;25;20\n",
    )
    .unwrap();
    let limits = LimitsTable::load(&limits_path).unwrap();

    let day = |d: u32, h: u32| {
        NaiveDate::from_ymd_opt(2022, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    };
    let samples: Vec<Sample> = vec![
        (day(1, 10), 110.0),
        (day(1, 11), 90.0),
        (day(2, 10), 40.0),
    ];

    let daily_limit = limits.get("MP10", PeriodKind::Daily24h).unwrap();
    let aggregated = aggregate(&samples, PeriodKind::Daily24h);
    assert_eq!(aggregated.len(), 2);

    // Day 1 max 110 exceeds PI-2..PF but not PI-1 (120, strict >)
    let (key, value) = aggregated[0];
    assert_eq!(key, PeriodKey::Date(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()));
    let flags = exceedance::evaluate(value, daily_limit);
    assert_eq!(flags, [false, true, true, true, true]);

    // Day 2 max 40 stays under every daily tier
    let (_, value) = aggregated[1];
    let flags = exceedance::evaluate(value, daily_limit);
    assert_eq!(flags, [false, false, false, false, false]);

    // The annual mean of all samples exceeds every annual tier above 20
    let annual_limit = limits.get("MP10", PeriodKind::AnnualArithmeticMean).unwrap();
    let annual = aggregate(&samples, PeriodKind::AnnualArithmeticMean);
    assert_eq!(annual, vec![(PeriodKey::Year(2022), 80.0)]);
    let flags = exceedance::evaluate(80.0, annual_limit);
    assert_eq!(flags, [true, true, true, true, true]);
}

#[test]
fn test_violations_command_keeps_same_named_stations_apart() {
    use airq_processor::app::models::StandardizedReading;
    use airq_processor::cli::{args::Args, commands};
    use clap::Parser;

    let dir = TempDir::new().unwrap();
    let std_dir = dir.path().join("padronizado");
    let out_dir = dir.path().join("violacoes");
    fs::create_dir_all(&std_dir).unwrap();

    let limits_path = dir.path().join("limites.csv");
    fs::write(
        &limits_path,
        "Sigla;Periodo;PI-1;PI-2;PI-3;PI-4;PF\nMP10;24h;120;100;75;50;45\n",
    )
    .unwrap();

    // Two stations named "Centro" in different states, same day
    let reading = |state: &str, hour: u32, value: f64| StandardizedReading {
        station: "Centro".to_string(),
        state: state.to_string(),
        pollutant: "MP10".to_string(),
        raw_value: Some(value),
        raw_unit: "µg/m³".to_string(),
        value: Some(value),
        unit: Unit::MicrogramsPerCubicMeter,
        timestamp: NaiveDate::from_ymd_opt(2022, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0),
        latitude: None,
        longitude: None,
    };
    let readings = vec![
        reading("SP", 10, 10.0),
        reading("SP", 11, 8.0),
        reading("MG", 10, 200.0),
        reading("MG", 11, 150.0),
    ];
    dataset_io::write_standardized(&std_dir.join("MP10.parquet"), &readings).unwrap();

    let args = Args::parse_from([
        "airq-processor",
        "violations",
        "--input",
        std_dir.to_str().unwrap(),
        "--limits",
        limits_path.to_str().unwrap(),
        "--output",
        out_dir.to_str().unwrap(),
        "--quiet",
    ]);
    let stats = commands::run(args).unwrap();
    assert_eq!(stats.violations, 1);

    let aggregated = dataset_io::read_aggregated(&out_dir.join("MP10.parquet")).unwrap();
    assert_eq!(aggregated.len(), 2);

    let mg = aggregated.iter().find(|a| a.state == "MG").unwrap();
    let sp = aggregated.iter().find(|a| a.state == "SP").unwrap();
    assert_eq!(mg.value, 200.0);
    assert_eq!(mg.exceedances, [true, true, true, true, true]);
    assert_eq!(sp.value, 10.0);
    assert!(!sp.is_violation());
}

#[test]
fn test_aggregated_parquet_round_trip_preserves_flags() {
    use airq_processor::app::models::AggregatedValue;

    let aggregated = vec![AggregatedValue {
        station: "Centro".to_string(),
        state: "SP".to_string(),
        latitude: Some(-23.5505),
        longitude: Some(-46.6333),
        pollutant: "MP10".to_string(),
        period: PeriodKind::Daily24h,
        key: PeriodKey::Date(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()),
        value: 110.0,
        thresholds: [Some(120.0), Some(100.0), Some(75.0), Some(50.0), Some(45.0)],
        exceedances: [false, true, true, true, true],
    }];

    let out = TempDir::new().unwrap();
    let path = out.path().join("MP10.parquet");
    dataset_io::write_aggregated(&path, &aggregated).unwrap();
    let restored = dataset_io::read_aggregated(&path).unwrap();
    assert_eq!(restored, aggregated);

    let events = exceedance::violations_for_tier(&restored, Tier::Pi2);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].station, "Centro");
    assert_eq!(
        events[0].timestamp,
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    );
    assert!(exceedance::violations_for_tier(&restored, Tier::Pi1).is_empty());
}
