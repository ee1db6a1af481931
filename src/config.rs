use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::utils::default_timestamp_formats;

/// Run configuration. Every field has a default so a partial JSON file is
/// enough.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_folder: PathBuf,
    pub raw_file: String,
    pub clean_file: String,
    pub result_file: String,
    pub delimiter: String,
    pub write_bom: bool,
    pub null_markers: Vec<String>,
    pub timestamp_formats: Vec<String>,
    pub workers: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_folder: PathBuf::from("data"),
            raw_file: "raw_air_quality_data.csv".to_string(),
            clean_file: "clean_air_quality_data.csv".to_string(),
            result_file: "aqi_result.csv".to_string(),
            delimiter: ",".to_string(),
            write_bom: true,
            null_markers: default_null_markers(),
            timestamp_formats: default_timestamp_formats(),
            workers: None,
        }
    }
}

fn default_null_markers() -> Vec<String> {
    ["", "NaN", "nan", "null", "NULL", "-", "N/A"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

impl PipelineConfig {
    pub fn raw_path(&self) -> PathBuf {
        self.data_folder.join(&self.raw_file)
    }

    pub fn clean_path(&self) -> PathBuf {
        self.data_folder.join(&self.clean_file)
    }

    pub fn result_path(&self) -> PathBuf {
        self.data_folder.join(&self.result_file)
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    pub fn normalizer_config(&self) -> NormalizerConfig {
        NormalizerConfig {
            null_markers: self.null_markers.clone(),
            timestamp_formats: self.timestamp_formats.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, message: &str| ConfigError::Invalid {
            field: field.to_string(),
            message: message.to_string(),
        };
        for (field, name) in [
            ("raw_file", &self.raw_file),
            ("clean_file", &self.clean_file),
            ("result_file", &self.result_file),
        ] {
            if name.trim().is_empty() {
                return Err(invalid(field, "file name must not be empty"));
            }
        }
        if self.delimiter.len() != 1 {
            return Err(invalid("delimiter", "must be exactly one byte"));
        }
        if self.workers == Some(0) {
            return Err(invalid("workers", "must be at least 1"));
        }
        if self.timestamp_formats.is_empty() {
            return Err(invalid("timestamp_formats", "at least one format is required"));
        }
        Ok(())
    }
}

/// The slice of configuration the normalizer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
    pub null_markers: Vec<String>,
    pub timestamp_formats: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        PipelineConfig::default().normalizer_config()
    }
}

/// Loads a JSON configuration file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound { path: path.to_path_buf() });
    }

    let file = File::open(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let reader = BufReader::new(file);

    let config: PipelineConfig = serde_json::from_reader(reader).map_err(|e| ConfigError::JsonParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.raw_path(), PathBuf::from("data/raw_air_quality_data.csv"));
        assert_eq!(config.delimiter_byte(), b',');
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "data_folder": "/srv/aqi", "delimiter": ";", "workers": 2 }}"#).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.data_folder, PathBuf::from("/srv/aqi"));
        assert_eq!(config.delimiter_byte(), b';');
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.result_file, "aqi_result.csv");
        assert!(config.write_bom);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::JsonParseError { .. }));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = PipelineConfig {
            delimiter: "::".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let config = PipelineConfig {
            workers: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            timestamp_formats: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
