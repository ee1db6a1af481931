//! Stage orchestration: raw table -> clean table -> AQI table.
//!
//! Each stage reads one file, runs a pure batch transform and writes one
//! file, so re-running a stage on the same input rewrites the same output.

use log::{info, warn};
use std::path::Path;

use crate::aqi::AqiEngine;
use crate::breakpoints::BreakpointTable;
use crate::config::PipelineConfig;
use crate::data_models::AqiResult;
use crate::errors::PipelineError;
use crate::metrics::METRICS;
use crate::normalizer::{self, NormalizeStats};
use crate::parallel::{stage_progress, WorkerPool};
use crate::parsers::csv_parser;
use crate::time_operation;
use crate::writers::{self, TableFormat};

/// Summary of one AQI stage run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AqiStageReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub rows_without_aqi: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    engine: AqiEngine,
    pool: WorkerPool,
    quiet: bool,
}

impl Pipeline {
    /// Validates configuration and the breakpoint table before any data is
    /// touched.
    pub fn new(config: PipelineConfig, quiet: bool) -> Result<Self, PipelineError> {
        config.validate()?;
        let table = BreakpointTable::standard();
        table.validate()?;
        let pool = WorkerPool::new(config.workers)?;
        Ok(Self {
            config,
            engine: AqiEngine::new(table),
            pool,
            quiet,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn table_format(&self) -> TableFormat {
        TableFormat {
            delimiter: self.config.delimiter_byte(),
            write_bom: self.config.write_bom,
        }
    }

    pub fn run_clean_stage(&self, input: &Path, output: &Path) -> Result<NormalizeStats, PipelineError> {
        info!("Clean stage: {} -> {}", input.display(), output.display());
        let progress = stage_progress(0, self.quiet);

        progress.set_message("reading raw table");
        let raw = time_operation!(
            "read raw table",
            csv_parser::read_raw_table(input, self.config.delimiter_byte(), &self.config.null_markers)
        )?;
        METRICS.lock().record_raw_read(raw.readings.len(), raw.skipped_records);
        progress.set_length(raw.readings.len() as u64);

        progress.set_message("normalizing");
        let normalizer_config = self.config.normalizer_config();
        let outcome = time_operation!(
            "normalize",
            self.pool.install(|| {
                normalizer::normalize_with_progress(&raw.readings, &raw.pollutants, &normalizer_config, &progress)
            })
        );
        report_normalize(&outcome.stats);
        METRICS.lock().record_normalize(&outcome.stats);

        progress.set_message("writing clean table");
        time_operation!(
            "write clean table",
            writers::write_clean_table(output, &outcome.clean, self.table_format())
        )?;
        METRICS.lock().record_clean_written(outcome.clean.len());
        progress.finish_with_message("clean stage completed");

        Ok(outcome.stats)
    }

    /// Sub-index columns are emitted only for pollutants that carry a value
    /// somewhere in the clean table.
    pub fn run_aqi_stage(&self, input: &Path, output: &Path) -> Result<AqiStageReport, PipelineError> {
        info!("AQI stage: {} -> {}", input.display(), output.display());
        let progress = stage_progress(0, self.quiet);

        progress.set_message("reading clean table");
        let clean = time_operation!(
            "read clean table",
            csv_parser::read_clean_table(input, self.config.delimiter_byte(), &self.config.timestamp_formats)
        )?;
        if clean.skipped_records > 0 {
            warn!("Skipped {} unreadable rows in {}", clean.skipped_records, input.display());
        }
        METRICS.lock().record_clean_read(clean.readings.len());
        progress.set_length(clean.readings.len() as u64);

        let pollutants = clean.populated_pollutants();
        for pollutant in clean.pollutants.iter().filter(|p| !pollutants.contains(*p)) {
            info!("Column {} holds no values, no sub-index column written", pollutant);
        }

        progress.set_message("computing AQI");
        let results: Vec<AqiResult> = time_operation!(
            "compute AQI",
            self.pool
                .install(|| self.engine.compute_all_with_progress(&clean.readings, &pollutants, &progress))
        )?;
        for pollutant in &pollutants {
            let computed = results
                .iter()
                .filter(|r| r.sub_indices.get(*pollutant).is_some())
                .count();
            info!("Computed {} sub-indices for {}", computed, pollutant);
        }

        progress.set_message("writing AQI table");
        time_operation!(
            "write AQI table",
            writers::write_result_table(output, &results, &pollutants, self.table_format())
        )?;
        METRICS.lock().record_results(&results);
        progress.finish_with_message("AQI stage completed");

        let rows_without_aqi = results.iter().filter(|r| r.aqi.is_none()).count();
        if rows_without_aqi > 0 {
            warn!("{} rows have no computable AQI", rows_without_aqi);
        }
        Ok(AqiStageReport {
            rows_in: clean.readings.len(),
            rows_out: results.len(),
            rows_without_aqi,
        })
    }

    /// Both stages over the configured file locations.
    pub fn run_all(&self) -> Result<(NormalizeStats, AqiStageReport), PipelineError> {
        let clean_path = self.config.clean_path();
        let stats = self.run_clean_stage(&self.config.raw_path(), &clean_path)?;
        let report = self.run_aqi_stage(&clean_path, &self.config.result_path())?;
        Ok((stats, report))
    }
}

fn report_normalize(stats: &NormalizeStats) {
    info!("Rows in: {}", stats.rows_in);
    for (pollutant, counts) in &stats.per_pollutant {
        info!(
            "  {:<7} valid={} missing={} non-numeric={} out-of-range={}",
            pollutant.column_name(),
            counts.valid,
            counts.missing,
            counts.non_numeric,
            counts.out_of_range
        );
    }
    if stats.dropped_bad_timestamp > 0 {
        warn!("Dropped {} rows with unparseable getTime", stats.dropped_bad_timestamp);
    }
    if stats.dropped_no_pollutant > 0 {
        warn!("Dropped {} rows without any valid pollutant", stats.dropped_no_pollutant);
    }
    info!(
        "After dropping rows with no pollutant: {}, after hourly grouping: {}",
        stats.rows_bucketed, stats.groups_out
    );
}
