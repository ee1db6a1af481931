use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::data_models::Pollutant;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse JSON configuration in {path}: {source}")]
    JsonParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Configuration file not found at {path}")]
    NotFound { path: PathBuf },
    #[error("Invalid configuration value for '{field}': {message}")]
    Invalid { field: String, message: String },
}

/// Table-level read failures. Row-level junk never ends up here; it degrades
/// to absent values inside the normalizer.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading data file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Error reading CSV headers in {path}: {source}")]
    HeaderReadError {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Required column '{column}' missing from {path}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("No pollutant columns found in {path}")]
    NoPollutantColumns { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration parsing failed: {0}")]
    ConfigParse(#[from] ConfigError),
    #[error("Parsing failed: {0}")]
    Parse(#[from] ParseError),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Invalid breakpoint table for {pollutant}: {message}")]
    InvalidBreakpoints { pollutant: Pollutant, message: String },
    #[error("AQI value {0} cannot be classified")]
    InvalidAqi(f64),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}
