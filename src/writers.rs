use csv::WriterBuilder;
use log::info;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::data_models::{AqiResult, CleanReading, Pollutant};
use crate::errors::PipelineError;
use crate::parsers::csv_parser::{STATION_ID_COL, STATION_NAME_COL, TIME_COL};
use crate::utils::{format_optional_float, format_time};

pub const AQI_COL: &str = "AQI";
pub const LEVEL_COL: &str = "Level";

/// Output formatting shared by both tables.
#[derive(Debug, Clone, Copy)]
pub struct TableFormat {
    pub delimiter: u8,
    pub write_bom: bool,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            write_bom: true,
        }
    }
}

pub fn clean_header() -> Vec<String> {
    let mut header = vec![
        STATION_ID_COL.to_string(),
        STATION_NAME_COL.to_string(),
        TIME_COL.to_string(),
    ];
    header.extend(Pollutant::ALL.iter().map(|p| p.column_name().to_string()));
    header
}

/// Clean columns followed by one sub-index column per active pollutant, then
/// the overall index and its level.
pub fn result_header(pollutants: &[Pollutant]) -> Vec<String> {
    let mut header = clean_header();
    header.extend(pollutants.iter().map(|p| p.aqi_column_name()));
    header.push(AQI_COL.to_string());
    header.push(LEVEL_COL.to_string());
    header
}

fn clean_fields(reading: &CleanReading) -> Vec<String> {
    let mut fields = vec![
        reading.station_id.clone(),
        reading.station_name.clone(),
        format_time(&reading.get_time),
    ];
    fields.extend(reading.values.iter().map(|(_, v)| format_optional_float(v)));
    fields
}

fn result_fields(result: &AqiResult, pollutants: &[Pollutant]) -> Vec<String> {
    let mut fields = clean_fields(&result.reading);
    fields.extend(
        pollutants
            .iter()
            .map(|&p| format_optional_float(result.sub_indices.get(p))),
    );
    fields.push(format_optional_float(result.aqi));
    fields.push(result.level.map(|l| l.label().to_string()).unwrap_or_default());
    fields
}

/// Writes header and rows to any sink.
pub fn write_rows<W: Write>(
    mut sink: W,
    header: &[String],
    rows: impl Iterator<Item = Vec<String>>,
    format: TableFormat,
) -> Result<(), csv::Error> {
    if format.write_bom {
        sink.write_all("\u{feff}".as_bytes())?;
    }
    let mut writer = WriterBuilder::new().delimiter(format.delimiter).from_writer(sink);
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_file(
    path: &Path,
    header: &[String],
    rows: impl Iterator<Item = Vec<String>>,
    format: TableFormat,
) -> Result<(), PipelineError> {
    let to_error = |source: csv::Error| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| to_error(e.into()))?;
    }
    let file = File::create(path).map_err(|e| to_error(e.into()))?;
    write_rows(file, header, rows, format).map_err(to_error)
}

pub fn write_clean_table(path: &Path, readings: &[CleanReading], format: TableFormat) -> Result<(), PipelineError> {
    write_file(path, &clean_header(), readings.iter().map(clean_fields), format)?;
    info!("Wrote {} clean rows to {}", readings.len(), path.display());
    Ok(())
}

pub fn write_result_table(
    path: &Path,
    results: &[AqiResult],
    pollutants: &[Pollutant],
    format: TableFormat,
) -> Result<(), PipelineError> {
    write_file(
        path,
        &result_header(pollutants),
        results.iter().map(|r| result_fields(r, pollutants)),
        format,
    )?;
    info!("Wrote {} AQI rows to {}", results.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::{Level, PollutantValues};
    use chrono::NaiveDate;

    fn reading() -> CleanReading {
        CleanReading {
            station_id: "31390908889087".to_string(),
            station_name: "Hà Nội: 556 Nguyễn Văn Cừ".to_string(),
            get_time: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(7, 0, 0).unwrap(),
            values: PollutantValues::new().with(Pollutant::Pm25, 12.0).with(Pollutant::Co, 0.75),
        }
    }

    #[test]
    fn test_clean_row_layout() {
        let mut out = Vec::new();
        write_rows(
            &mut out,
            &clean_header(),
            std::iter::once(clean_fields(&reading())),
            TableFormat { delimiter: b',', write_bom: false },
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "stationId,stationName,getTime,PM-2-5,PM-10,NO2,SO2,O3,CO");
        assert_eq!(
            lines[1],
            "31390908889087,Hà Nội: 556 Nguyễn Văn Cừ,2024-05-01 07:00:00,12,,,,,0.75"
        );
    }

    #[test]
    fn test_result_row_with_absent_aqi() {
        let result = AqiResult {
            reading: reading(),
            sub_indices: PollutantValues::new(),
            aqi: None,
            level: None,
        };
        let pollutants = [Pollutant::Pm25, Pollutant::Co];
        let header = result_header(&pollutants);
        assert_eq!(&header[header.len() - 4..], ["AQI_PM-2-5", "AQI_CO", "AQI", "Level"]);

        let fields = result_fields(&result, &pollutants);
        assert_eq!(&fields[fields.len() - 4..], ["", "", "", ""]);
    }

    #[test]
    fn test_result_row_with_level() {
        let result = AqiResult {
            reading: reading(),
            sub_indices: PollutantValues::new().with(Pollutant::Pm25, 50.0),
            aqi: Some(50.0),
            level: Some(Level::Good),
        };
        let fields = result_fields(&result, &[Pollutant::Pm25]);
        assert_eq!(&fields[fields.len() - 3..], ["50", "50", "Good"]);
    }

    #[test]
    fn test_bom_prefix() {
        let mut out = Vec::new();
        write_rows(&mut out, &clean_header(), std::iter::empty(), TableFormat::default()).unwrap();
        assert!(out.starts_with("\u{feff}".as_bytes()));
    }
}
