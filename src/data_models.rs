use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;

use crate::models::SensorValue;

/// The six pollutants tracked by the index, in canonical column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pollutant {
    Pm25,
    Pm10,
    No2,
    So2,
    O3,
    Co,
}

impl Pollutant {
    pub const COUNT: usize = 6;

    pub const ALL: [Pollutant; Pollutant::COUNT] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::O3,
        Pollutant::Co,
    ];

    /// Column name used by the crawler and by every table we write.
    pub fn column_name(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM-2-5",
            Pollutant::Pm10 => "PM-10",
            Pollutant::No2 => "NO2",
            Pollutant::So2 => "SO2",
            Pollutant::O3 => "O3",
            Pollutant::Co => "CO",
        }
    }

    /// Name of the sub-index column in the result table.
    pub fn aqi_column_name(self) -> String {
        format!("AQI_{}", self.column_name())
    }

    pub fn from_column_name(name: &str) -> Option<Pollutant> {
        Pollutant::ALL
            .into_iter()
            .find(|p| p.column_name() == name.trim())
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Physically plausible concentration range; anything outside is treated
    /// as a sensor error.
    pub fn plausible_range(self) -> (f64, f64) {
        match self {
            Pollutant::Pm25 => (0.0, 500.0),
            Pollutant::Pm10 => (0.0, 800.0),
            Pollutant::No2 => (0.0, 1000.0),
            Pollutant::So2 => (0.0, 1000.0),
            Pollutant::O3 => (0.0, 800.0),
            Pollutant::Co => (0.0, 50.0),
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Severity category derived from the overall AQI. Ordered from least to
/// most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Good,
        Level::Moderate,
        Level::UnhealthyForSensitive,
        Level::Unhealthy,
        Level::VeryUnhealthy,
        Level::Hazardous,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Level::Good => "Good",
            Level::Moderate => "Moderate",
            Level::UnhealthyForSensitive => "Unhealthy for Sensitive",
            Level::Unhealthy => "Unhealthy",
            Level::VeryUnhealthy => "Very Unhealthy",
            Level::Hazardous => "Hazardous",
        }
    }

    pub fn from_label(label: &str) -> Option<Level> {
        Level::ALL.into_iter().find(|l| l.label() == label.trim())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One value slot per tracked pollutant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PollutantValues([Option<f64>; Pollutant::COUNT]);

impl PollutantValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pollutant: Pollutant) -> Option<f64> {
        self.0[pollutant.index()]
    }

    pub fn set(&mut self, pollutant: Pollutant, value: Option<f64>) {
        self.0[pollutant.index()] = value;
    }

    pub fn with(mut self, pollutant: Pollutant, value: f64) -> Self {
        self.set(pollutant, Some(value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pollutant, Option<f64>)> + '_ {
        Pollutant::ALL.into_iter().map(move |p| (p, self.get(p)))
    }

    pub fn present(&self) -> impl Iterator<Item = (Pollutant, f64)> + '_ {
        self.iter().filter_map(|(p, v)| v.map(|v| (p, v)))
    }

    pub fn present_count(&self) -> usize {
        self.0.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }
}

/// A row as emitted by the crawler. Nothing about it is trusted.
#[derive(Debug, Clone, Default)]
pub struct RawReading {
    pub station_id: String,
    pub station_name: String,
    pub get_time: String,
    pub sensors: HashMap<String, SensorValue>,
}

/// A validated, hour-bucketed reading; unique per (station_id, get_time).
#[derive(Debug, Clone, PartialEq)]
pub struct CleanReading {
    pub station_id: String,
    pub station_name: String,
    pub get_time: NaiveDateTime,
    pub values: PollutantValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AqiResult {
    pub reading: CleanReading,
    pub sub_indices: PollutantValues,
    pub aqi: Option<f64>,
    pub level: Option<Level>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names_resolve() {
        assert_eq!(Pollutant::from_column_name(" PM-2-5 "), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_column_name("PM2.5"), None);
        assert_eq!(Pollutant::Co.aqi_column_name(), "AQI_CO");
        assert_eq!(Pollutant::Pm10.to_string(), "PM-10");
    }

    #[test]
    fn test_levels_ordered_by_severity() {
        assert!(Level::Good < Level::Moderate);
        assert!(Level::VeryUnhealthy < Level::Hazardous);
        assert_eq!(Level::from_label("Unhealthy for Sensitive"), Some(Level::UnhealthyForSensitive));
        assert_eq!(Level::from_label("unknown"), None);
    }

    #[test]
    fn test_values_track_presence() {
        let values = PollutantValues::new().with(Pollutant::So2, 4.0).with(Pollutant::Co, 0.5);
        assert_eq!(values.present_count(), 2);
        assert_eq!(
            values.present().collect::<Vec<_>>(),
            vec![(Pollutant::So2, 4.0), (Pollutant::Co, 0.5)]
        );
        assert!(PollutantValues::new().is_empty());
    }
}
