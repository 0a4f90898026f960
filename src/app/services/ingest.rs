//! Raw monitoring data ingestion
//!
//! The raw tree has one directory per state, each holding comma-separated
//! CSV exports encoded in Latin-1. Some exports carry a UTF-8 BOM that,
//! read as Latin-1, mangles the first header into `ï»¿Data`; values from
//! that column backfill empty `Data` cells.
//!
//! Malformed rows and files are skipped with a warning, never fatal: a
//! multi-year scrape always contains a few broken exports.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::app::models::{RawReading, RawValue};
use crate::constants::columns;
use crate::{Error, Result};

/// Counters accumulated over one ingestion run
#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub files: usize,
    pub failed_files: usize,
    pub rows: usize,
    pub skipped_rows: usize,
    pub states: usize,
}

impl IngestStats {
    pub fn summary(&self) -> String {
        format!(
            "{} rows from {} files across {} states ({} files failed, {} rows skipped)",
            self.rows, self.files, self.states, self.failed_files, self.skipped_rows
        )
    }
}

/// One raw CSV file and the state directory it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub state: String,
    pub path: PathBuf,
}

/// Finds every raw CSV under `root`, one state per first-level directory
pub fn scan(root: &Path) -> Result<Vec<RawFile>> {
    if !root.is_dir() {
        return Err(Error::raw_data_layout(
            root.display().to_string(),
            "raw data root is not a directory",
        ));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(2).max_depth(2) {
        let entry = entry.map_err(|e| {
            Error::raw_data_layout(root.display().to_string(), format!("cannot walk raw tree: {}", e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            continue;
        }
        let state = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::raw_data_layout(
                    path.display().to_string(),
                    "raw CSV is not inside a state directory",
                )
            })?;
        files.push(RawFile {
            state: state.to_string(),
            path: path.to_path_buf(),
        });
    }

    if files.is_empty() {
        return Err(Error::raw_data_layout(
            root.display().to_string(),
            "no raw CSV files found under state directories",
        ));
    }
    files.sort_by(|a, b| (&a.state, &a.path).cmp(&(&b.state, &b.path)));
    Ok(files)
}

/// Decodes Latin-1 bytes; every byte maps to the scalar of the same value
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Reads one raw CSV into raw readings, tallying into `stats`
pub fn read_file(file: &RawFile, stats: &mut IngestStats) -> Result<Vec<RawReading>> {
    let bytes = fs::read(&file.path)
        .map_err(|e| Error::io(format!("cannot read {}", file.path.display()), e))?;
    let decoded = decode_latin1(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(decoded.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| {
            Error::csv_parsing(file.path.display().to_string(), "cannot read header row", Some(e))
        })?
        .clone();

    let col = |name: &str| headers.iter().position(|h| h.trim() == name);
    let station_idx = col(columns::STATION)
        .ok_or_else(|| Error::missing_column(file.path.display().to_string(), columns::STATION))?;
    let pollutant_idx = col(columns::POLLUTANT)
        .ok_or_else(|| Error::missing_column(file.path.display().to_string(), columns::POLLUTANT))?;
    let value_idx = col(columns::VALUE)
        .ok_or_else(|| Error::missing_column(file.path.display().to_string(), columns::VALUE))?;
    let unit_idx = col(columns::UNIT)
        .ok_or_else(|| Error::missing_column(file.path.display().to_string(), columns::UNIT))?;
    let hour_idx = col(columns::HOUR)
        .ok_or_else(|| Error::missing_column(file.path.display().to_string(), columns::HOUR))?;
    // Either header spelling of the date column may be present; BOM-mangled
    // values backfill empty cells of the clean one
    let date_idx = col(columns::DATE);
    let mangled_date_idx = col(columns::DATE_BOM_MANGLED);
    if date_idx.is_none() && mangled_date_idx.is_none() {
        return Err(Error::missing_column(
            file.path.display().to_string(),
            columns::DATE,
        ));
    }

    let mut readings = Vec::new();
    for (row_number, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    "Skipping row {} of {}: {}",
                    row_number + 2,
                    file.path.display(),
                    e
                );
                stats.skipped_rows += 1;
                continue;
            }
        };

        let field = |idx: usize| record.get(idx).unwrap_or("").trim();
        let date_raw = {
            let clean = date_idx.map(field).unwrap_or("");
            if clean.is_empty() {
                mangled_date_idx.map(field).unwrap_or("")
            } else {
                clean
            }
        };

        readings.push(RawReading {
            station: field(station_idx).to_string(),
            state: file.state.clone(),
            pollutant: field(pollutant_idx).to_string(),
            value: RawValue::from_field(field(value_idx)),
            unit: field(unit_idx).to_string(),
            date_raw: date_raw.to_string(),
            hour_raw: field(hour_idx).to_string(),
        });
        stats.rows += 1;
    }

    debug!("{}: {} rows", file.path.display(), readings.len());
    Ok(readings)
}

/// Reads every scanned file, skipping files that fail outright
pub fn read_all(files: &[RawFile]) -> (Vec<RawReading>, IngestStats) {
    let mut stats = IngestStats::default();
    let mut readings = Vec::new();
    let mut states: Vec<&str> = Vec::new();

    for file in files {
        match read_file(file, &mut stats) {
            Ok(mut rows) => {
                stats.files += 1;
                if !states.contains(&file.state.as_str()) {
                    states.push(&file.state);
                }
                readings.append(&mut rows);
            }
            Err(e) => {
                warn!("Skipping file {}: {}", file.path.display(), e);
                stats.failed_files += 1;
            }
        }
    }
    stats.states = states.len();
    (readings, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "Data,Hora,Estacao,Poluente,Valor,Unidade\n";

    fn raw_tree(files: &[(&str, &str, &[u8])]) -> TempDir {
        let root = TempDir::new().unwrap();
        for (state, name, content) in files {
            let dir = root.path().join(state);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), content).unwrap();
        }
        root
    }

    #[test]
    fn test_scan_finds_state_tagged_csvs() {
        let root = raw_tree(&[
            ("SP", "a.csv", b"x"),
            ("MG", "b.CSV", b"x"),
            ("MG", "notes.txt", b"x"),
        ]);
        let files = scan(root.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].state, "MG");
        assert_eq!(files[1].state, "SP");
    }

    #[test]
    fn test_scan_empty_tree_errors() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("SP")).unwrap();
        assert!(scan(root.path()).is_err());
    }

    #[test]
    fn test_read_file_latin1_station_names() {
        // "São Caetano" with 'ã' as the Latin-1 byte 0xE3
        let mut content = HEADER.as_bytes().to_vec();
        content.extend_from_slice(b"2022-01-01,01:00,S\xE3o Caetano,O3,50,\xB5g/m\xB3\n");
        let root = raw_tree(&[("SP", "a.csv", &content)]);
        let files = scan(root.path()).unwrap();
        let mut stats = IngestStats::default();
        let rows = read_file(&files[0], &mut stats).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].station, "São Caetano");
        assert_eq!(rows[0].unit, "µg/m³");
        assert_eq!(rows[0].state, "SP");
    }

    #[test]
    fn test_bom_mangled_date_backfills_empty_date() {
        let content =
            b"\xEF\xBB\xBFData,Data,Hora,Estacao,Poluente,Valor,Unidade\n2022-01-01,,01:00,Centro,O3,50,ppb\n";
        let root = raw_tree(&[("SP", "a.csv", content)]);
        let files = scan(root.path()).unwrap();
        let mut stats = IngestStats::default();
        let rows = read_file(&files[0], &mut stats).unwrap();
        assert_eq!(rows[0].date_raw, "2022-01-01");
    }

    #[test]
    fn test_clean_date_wins_over_mangled() {
        let content =
            b"\xEF\xBB\xBFData,Data,Hora,Estacao,Poluente,Valor,Unidade\nOLD,2022-02-02,01:00,Centro,O3,50,ppb\n";
        let root = raw_tree(&[("SP", "a.csv", content)]);
        let files = scan(root.path()).unwrap();
        let mut stats = IngestStats::default();
        let rows = read_file(&files[0], &mut stats).unwrap();
        assert_eq!(rows[0].date_raw, "2022-02-02");
    }

    #[test]
    fn test_read_all_skips_broken_files_and_counts_states() {
        let good = format!("{}2022-01-01,01:00,Centro,O3,50,ppb\n", HEADER);
        let root = raw_tree(&[
            ("SP", "good.csv", good.as_bytes()),
            ("MG", "bad.csv", b"not,the,right,headers\n1,2,3,4\n"),
        ]);
        let files = scan(root.path()).unwrap();
        let (rows, stats) = read_all(&files);
        assert_eq!(rows.len(), 1);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.states, 1);
    }
}
