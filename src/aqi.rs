use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::breakpoints::BreakpointTable;
use crate::data_models::{AqiResult, CleanReading, Level, Pollutant, PollutantValues};
use crate::errors::PipelineError;

/// Turns clean readings into sub-indices, an overall index and a level.
#[derive(Debug, Clone, Default)]
pub struct AqiEngine {
    table: BreakpointTable,
}

impl AqiEngine {
    pub fn new(table: BreakpointTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &BreakpointTable {
        &self.table
    }

    /// Linear interpolation inside the matching breakpoint segment.
    pub fn compute_sub_index(&self, pollutant: Pollutant, concentration: Option<f64>) -> Option<f64> {
        let c = concentration?;
        let s = self.table.lookup(pollutant, c)?;
        // Pin the upper edge so c_high maps to exactly i_high.
        if c == s.c_high {
            return Some(s.i_high);
        }
        Some(s.i_low + (s.i_high - s.i_low) / (s.c_high - s.c_low) * (c - s.c_low))
    }

    /// The worst pollutant drives the index.
    pub fn compute_overall(sub_indices: &PollutantValues) -> Option<f64> {
        sub_indices.present().map(|(_, v)| v).reduce(f64::max)
    }

    pub fn classify(aqi: f64) -> Result<Level, PipelineError> {
        if aqi.is_nan() || aqi < 0.0 {
            return Err(PipelineError::InvalidAqi(aqi));
        }
        let level = if aqi <= 50.0 {
            Level::Good
        } else if aqi <= 100.0 {
            Level::Moderate
        } else if aqi <= 150.0 {
            Level::UnhealthyForSensitive
        } else if aqi <= 200.0 {
            Level::Unhealthy
        } else if aqi <= 300.0 {
            Level::VeryUnhealthy
        } else {
            Level::Hazardous
        };
        Ok(level)
    }

    /// Computes sub-indices for the given pollutant columns only; the others
    /// stay absent even when the reading carries a value.
    pub fn compute(&self, reading: &CleanReading, pollutants: &[Pollutant]) -> Result<AqiResult, PipelineError> {
        let mut sub_indices = PollutantValues::new();
        for &pollutant in pollutants {
            sub_indices.set(pollutant, self.compute_sub_index(pollutant, reading.values.get(pollutant)));
        }
        let aqi = Self::compute_overall(&sub_indices);
        let level = aqi.map(Self::classify).transpose()?;
        Ok(AqiResult {
            reading: reading.clone(),
            sub_indices,
            aqi,
            level,
        })
    }

    /// Batch form of [`AqiEngine::compute`]. Rows are independent, so the work
    /// is spread over the rayon pool; output keeps input order.
    pub fn compute_all(&self, readings: &[CleanReading], pollutants: &[Pollutant]) -> Result<Vec<AqiResult>, PipelineError> {
        self.compute_all_with_progress(readings, pollutants, &ProgressBar::hidden())
    }

    /// Same as [`AqiEngine::compute_all`], advancing `progress` once per row.
    pub fn compute_all_with_progress(
        &self,
        readings: &[CleanReading],
        pollutants: &[Pollutant],
        progress: &ProgressBar,
    ) -> Result<Vec<AqiResult>, PipelineError> {
        readings
            .par_iter()
            .map(|reading| {
                let result = self.compute(reading, pollutants);
                progress.inc(1);
                result
            })
            .collect()
    }
}
