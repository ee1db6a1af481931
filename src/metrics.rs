use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::data_models::{AqiResult, Level};
use crate::normalizer::NormalizeStats;

/// Global metrics instance
pub static METRICS: Lazy<Mutex<Metrics>> = Lazy::new(|| Mutex::new(Metrics::new()));

/// Run-level counters, filled in by the pipeline driver.
#[derive(Debug, Default)]
pub struct Metrics {
    pub raw_rows_read: u64,
    pub raw_records_skipped: u64,
    pub rows_dropped_bad_timestamp: u64,
    pub rows_dropped_no_pollutant: u64,
    pub clean_rows_written: u64,
    pub clean_rows_read: u64,
    pub result_rows_written: u64,
    pub results_without_aqi: u64,
    pub level_counts: BTreeMap<Level, u64>,
    pub processing_times: Vec<(String, Duration)>,
    pub start_time: Option<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn record_raw_read(&mut self, rows: usize, skipped: usize) {
        self.raw_rows_read += rows as u64;
        self.raw_records_skipped += skipped as u64;
    }

    pub fn record_normalize(&mut self, stats: &NormalizeStats) {
        self.rows_dropped_bad_timestamp += stats.dropped_bad_timestamp as u64;
        self.rows_dropped_no_pollutant += stats.dropped_no_pollutant as u64;
    }

    pub fn record_clean_written(&mut self, rows: usize) {
        self.clean_rows_written += rows as u64;
    }

    pub fn record_clean_read(&mut self, rows: usize) {
        self.clean_rows_read += rows as u64;
    }

    pub fn record_results(&mut self, results: &[AqiResult]) {
        self.result_rows_written += results.len() as u64;
        for result in results {
            match result.level {
                Some(level) => *self.level_counts.entry(level).or_insert(0) += 1,
                None => self.results_without_aqi += 1,
            }
        }
    }

    pub fn record_processing_time(&mut self, operation: String, duration: Duration) {
        self.processing_times.push((operation, duration));
    }

    pub fn get_total_duration(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    pub fn print_summary(&self) {
        let duration = self.get_total_duration();
        println!("\n========== AQI Pipeline Summary ==========");
        println!("Total Duration: {:.2?}", duration);
        if self.raw_rows_read > 0 || self.raw_records_skipped > 0 {
            println!("Raw Rows Read: {}", self.raw_rows_read);
            println!("Unreadable Records Skipped: {}", self.raw_records_skipped);
            println!("Dropped (bad timestamp): {}", self.rows_dropped_bad_timestamp);
            println!("Dropped (no valid pollutant): {}", self.rows_dropped_no_pollutant);
            println!("Clean Rows Written: {}", self.clean_rows_written);
        }
        if self.clean_rows_read > 0 || self.result_rows_written > 0 {
            println!("Clean Rows Read: {}", self.clean_rows_read);
            println!("AQI Rows Written: {}", self.result_rows_written);
            println!("Rows Without AQI: {}", self.results_without_aqi);
            for level in Level::ALL {
                let count = self.level_counts.get(&level).copied().unwrap_or(0);
                println!("  {:<24} {}", level.label(), count);
            }
        }

        if !self.processing_times.is_empty() {
            println!("\nProcessing Times:");
            for (op, duration) in &self.processing_times {
                println!("  {}: {:.2?}", op, duration);
            }
        }
        println!("==========================================\n");
    }
}

/// Helper macro to time an operation
#[macro_export]
macro_rules! time_operation {
    ($name:expr, $op:expr) => {{
        let start = std::time::Instant::now();
        let result = $op;
        let duration = start.elapsed();
        $crate::metrics::METRICS
            .lock()
            .record_processing_time($name.to_string(), duration);
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::{CleanReading, PollutantValues};
    use chrono::NaiveDate;

    fn result(level: Option<Level>) -> AqiResult {
        AqiResult {
            reading: CleanReading {
                station_id: "1".to_string(),
                station_name: "A".to_string(),
                get_time: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
                values: PollutantValues::new(),
            },
            sub_indices: PollutantValues::new(),
            aqi: level.map(|_| 42.0),
            level,
        }
    }

    #[test]
    fn test_level_histogram() {
        let mut metrics = Metrics::new();
        metrics.record_results(&[
            result(Some(Level::Good)),
            result(Some(Level::Good)),
            result(Some(Level::Hazardous)),
            result(None),
        ]);
        assert_eq!(metrics.result_rows_written, 4);
        assert_eq!(metrics.results_without_aqi, 1);
        assert_eq!(metrics.level_counts[&Level::Good], 2);
        assert_eq!(metrics.level_counts[&Level::Hazardous], 1);
    }

    #[test]
    fn test_normalize_counters_accumulate() {
        let mut metrics = Metrics::new();
        let stats = NormalizeStats {
            dropped_bad_timestamp: 3,
            dropped_no_pollutant: 2,
            ..Default::default()
        };
        metrics.record_normalize(&stats);
        metrics.record_normalize(&stats);
        assert_eq!(metrics.rows_dropped_bad_timestamp, 6);
        assert_eq!(metrics.rows_dropped_no_pollutant, 4);
    }
}
