use csv::{ReaderBuilder, StringRecord};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::data_models::{CleanReading, Pollutant, PollutantValues, RawReading};
use crate::errors::ParseError;
use crate::models::SensorValue;
use crate::utils::{floor_to_hour, parse_timestamp};

pub const STATION_ID_COL: &str = "stationId";
pub const STATION_NAME_COL: &str = "stationName";
pub const TIME_COL: &str = "getTime";

const UTF8_BOM: char = '\u{feff}';

/// Raw crawler table plus the pollutant columns its header carries.
#[derive(Debug, Default)]
pub struct RawTable {
    pub readings: Vec<RawReading>,
    pub pollutants: Vec<Pollutant>,
    pub skipped_records: usize,
}

/// A previously written clean table.
#[derive(Debug, Default)]
pub struct CleanTable {
    pub readings: Vec<CleanReading>,
    pub pollutants: Vec<Pollutant>,
    pub skipped_records: usize,
}

impl CleanTable {
    /// Pollutant columns holding at least one value in this batch.
    pub fn populated_pollutants(&self) -> Vec<Pollutant> {
        self.pollutants
            .iter()
            .copied()
            .filter(|&p| self.readings.iter().any(|r| r.values.get(p).is_some()))
            .collect()
    }
}

/// Header name -> column index, with a leading BOM and padding removed.
struct HeaderIndex {
    columns: HashMap<String, usize>,
    names: Vec<String>,
}

impl HeaderIndex {
    fn from_record(headers: &StringRecord) -> Self {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches(UTF8_BOM).trim().to_string())
            .collect();
        let mut columns = HashMap::new();
        for (index, name) in names.iter().enumerate() {
            // First occurrence wins on duplicated headers.
            columns.entry(name.clone()).or_insert(index);
        }
        Self { columns, names }
    }

    fn require(&self, column: &str, path: &Path) -> Result<usize, ParseError> {
        self.columns.get(column).copied().ok_or_else(|| ParseError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
    }

    /// Pollutant columns present in this table, in canonical order.
    fn pollutants(&self) -> Vec<(Pollutant, usize)> {
        Pollutant::ALL
            .into_iter()
            .filter_map(|p| self.columns.get(p.column_name()).map(|&i| (p, i)))
            .collect()
    }
}

fn open_reader<R: Read>(source: R, delimiter: u8) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(source)
}

// Missing trailing fields read as empty, which the callers treat as absent.
fn field<'r>(record: &'r StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("")
}

/// Reads the crawler's raw table from disk.
pub fn read_raw_table(path: &Path, delimiter: u8, null_markers: &[String]) -> Result<RawTable, ParseError> {
    let file = File::open(path).map_err(|e| ParseError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let table = read_raw_from(file, path, delimiter, null_markers)?;
    info!(
        "Read {} raw rows from {} ({} pollutant columns: {})",
        table.readings.len(),
        path.display(),
        table.pollutants.len(),
        join_columns(&table.pollutants)
    );
    Ok(table)
}

/// Reads a raw table from any reader; `path` is only used in messages.
pub fn read_raw_from<R: Read>(
    source: R,
    path: &Path,
    delimiter: u8,
    null_markers: &[String],
) -> Result<RawTable, ParseError> {
    let mut reader = open_reader(source, delimiter);
    let headers = reader
        .headers()
        .map_err(|e| ParseError::HeaderReadError {
            path: path.to_path_buf(),
            source: e,
        })?
        .clone();
    let header = HeaderIndex::from_record(&headers);

    let id_idx = header.require(STATION_ID_COL, path)?;
    let name_idx = header.require(STATION_NAME_COL, path)?;
    let time_idx = header.require(TIME_COL, path)?;
    let pollutants: Vec<Pollutant> = header.pollutants().into_iter().map(|(p, _)| p).collect();
    if pollutants.is_empty() {
        return Err(ParseError::NoPollutantColumns { path: path.to_path_buf() });
    }

    let sensor_columns: Vec<(usize, &String)> = header
        .names
        .iter()
        .enumerate()
        .filter(|(i, _)| ![id_idx, name_idx, time_idx].contains(i))
        .filter(|(i, name)| header.columns.get(name.as_str()) == Some(i))
        .collect();

    let mut readings = Vec::new();
    let mut skipped_records = 0;
    for (row_index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to read record at row {} in {}: {}", row_index + 2, path.display(), e);
                skipped_records += 1;
                continue;
            }
        };

        let mut sensors = HashMap::with_capacity(sensor_columns.len());
        for &(index, name) in &sensor_columns {
            let value = SensorValue::from_field(field(&record, index), null_markers);
            if !value.is_empty() {
                sensors.insert(name.clone(), value);
            }
        }

        readings.push(RawReading {
            station_id: field(&record, id_idx).trim().to_string(),
            station_name: field(&record, name_idx).trim().to_string(),
            get_time: field(&record, time_idx).trim().to_string(),
            sensors,
        });
    }

    Ok(RawTable {
        readings,
        pollutants,
        skipped_records,
    })
}

/// Reads a clean table written by an earlier `clean` run.
pub fn read_clean_table(
    path: &Path,
    delimiter: u8,
    timestamp_formats: &[String],
) -> Result<CleanTable, ParseError> {
    let file = File::open(path).map_err(|e| ParseError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let table = read_clean_from(file, path, delimiter, timestamp_formats)?;
    info!(
        "Read {} clean rows from {} (pollutant columns: {})",
        table.readings.len(),
        path.display(),
        join_columns(&table.pollutants)
    );
    Ok(table)
}

/// Rows with an unreadable timestamp are skipped rather than failing the
/// whole table; values are taken as written.
pub fn read_clean_from<R: Read>(
    source: R,
    path: &Path,
    delimiter: u8,
    timestamp_formats: &[String],
) -> Result<CleanTable, ParseError> {
    let mut reader = open_reader(source, delimiter);
    let headers = reader
        .headers()
        .map_err(|e| ParseError::HeaderReadError {
            path: path.to_path_buf(),
            source: e,
        })?
        .clone();
    let header = HeaderIndex::from_record(&headers);

    let id_idx = header.require(STATION_ID_COL, path)?;
    let name_idx = header.require(STATION_NAME_COL, path)?;
    let time_idx = header.require(TIME_COL, path)?;
    let pollutant_columns = header.pollutants();
    if pollutant_columns.is_empty() {
        return Err(ParseError::NoPollutantColumns { path: path.to_path_buf() });
    }

    let mut readings = Vec::new();
    let mut skipped_records = 0;
    for (row_index, result) in reader.records().enumerate() {
        let row_num = row_index + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to read record at row {} in {}: {}", row_num, path.display(), e);
                skipped_records += 1;
                continue;
            }
        };

        let Some(get_time) = parse_timestamp(field(&record, time_idx), timestamp_formats).and_then(floor_to_hour)
        else {
            debug!("Skipping row {} in {}: unreadable getTime", row_num, path.display());
            skipped_records += 1;
            continue;
        };

        let mut values = PollutantValues::new();
        for &(pollutant, index) in &pollutant_columns {
            let value = field(&record, index).trim();
            if !value.is_empty() {
                values.set(pollutant, value.parse::<f64>().ok().filter(|v| v.is_finite()));
            }
        }

        readings.push(CleanReading {
            station_id: field(&record, id_idx).trim().to_string(),
            station_name: field(&record, name_idx).trim().to_string(),
            get_time,
            values,
        });
    }

    Ok(CleanTable {
        readings,
        pollutants: pollutant_columns.into_iter().map(|(p, _)| p).collect(),
        skipped_records,
    })
}

fn join_columns(pollutants: &[Pollutant]) -> String {
    pollutants
        .iter()
        .map(|p| p.column_name())
        .collect::<Vec<_>>()
        .join(", ")
}
