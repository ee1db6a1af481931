// Helper function to parse comma-decimal strings
pub fn parse_comma_decimal(s: &str) -> Result<f64, std::num::ParseFloatError> {
    s.replace(',', ".").parse::<f64>()
}

/// A raw sensor cell, classified but not yet trusted.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    Number(f64),
    Empty,
    Text(String),
}

impl SensorValue {
    /// Classifies a raw CSV field. Null markers are checked before trimming,
    /// the same way the ingestion parser handles them.
    pub fn from_field(raw_value: &str, null_markers: &[String]) -> SensorValue {
        if null_markers.iter().any(|marker| marker == raw_value) {
            return SensorValue::Empty;
        }
        let trimmed = raw_value.trim().trim_matches('"').trim();
        if trimmed.is_empty() || null_markers.iter().any(|marker| marker == trimmed) {
            return SensorValue::Empty;
        }
        match parse_comma_decimal(trimmed) {
            Ok(num) => SensorValue::Number(num),
            Err(_) => SensorValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SensorValue::Empty)
    }
}

impl From<f64> for SensorValue {
    fn from(value: f64) -> Self {
        SensorValue::Number(value)
    }
}

impl From<&str> for SensorValue {
    fn from(value: &str) -> Self {
        SensorValue::from_field(value, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["NaN".to_string(), "-".to_string()]
    }

    #[test]
    fn test_numeric_fields() {
        assert_eq!(SensorValue::from_field("12.5", &markers()), SensorValue::Number(12.5));
        assert_eq!(SensorValue::from_field(" 7 ", &markers()), SensorValue::Number(7.0));
        assert_eq!(SensorValue::from_field("\"3,25\"", &markers()), SensorValue::Number(3.25));
    }

    #[test]
    fn test_null_markers_and_blanks() {
        assert!(SensorValue::from_field("", &markers()).is_empty());
        assert!(SensorValue::from_field("   ", &markers()).is_empty());
        assert!(SensorValue::from_field("-", &markers()).is_empty());
        assert!(SensorValue::from_field(" NaN ", &markers()).is_empty());
    }

    #[test]
    fn test_text_fields() {
        assert_eq!(
            SensorValue::from_field("offline", &markers()),
            SensorValue::Text("offline".to_string())
        );
    }
}
