use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::errors::PipelineError;

/// Dedicated rayon pool for the row-level transforms. Results never depend on
/// the worker count; it only changes how fast a batch goes through.
pub struct WorkerPool {
    pool: ThreadPool,
    num_workers: usize,
}

impl WorkerPool {
    pub fn new(workers: Option<usize>) -> Result<Self, PipelineError> {
        let num_workers = workers.unwrap_or_else(num_cpus::get).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|i| format!("aqi-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
        info!("Initializing WorkerPool with {} workers", num_workers);
        Ok(Self { pool, num_workers })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Runs `op` with every rayon call inside it scheduled on this pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

/// Per-row bar for one pipeline stage; the length is usually set once the
/// input has been read. Hidden when `quiet` is set.
pub fn stage_progress(rows: u64, quiet: bool) -> ProgressBar {
    if quiet {
        let progress = ProgressBar::hidden();
        progress.set_length(rows);
        return progress;
    }
    let progress = ProgressBar::new(rows);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_worker_pool_creation() {
        let pool = WorkerPool::new(None).unwrap();
        assert!(pool.num_workers() > 0);
    }

    #[test]
    fn test_custom_worker_count() {
        let pool = WorkerPool::new(Some(2)).unwrap();
        assert_eq!(pool.num_workers(), 2);
        let threads = pool.install(rayon::current_num_threads);
        assert_eq!(threads, 2);
    }

    #[test]
    fn test_install_preserves_order() {
        let pool = WorkerPool::new(Some(3)).unwrap();
        let out: Vec<u32> = pool.install(|| (0..1000u32).into_par_iter().map(|x| x * 2).collect());
        assert_eq!(out, (0..1000u32).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_quiet_progress_is_hidden() {
        let progress = stage_progress(4, true);
        assert!(progress.is_hidden());
        assert_eq!(progress.length(), Some(4));
    }

    #[test]
    fn test_progress_counts_rows_from_pool() {
        let pool = WorkerPool::new(Some(4)).unwrap();
        let progress = stage_progress(0, true);
        progress.set_length(250);
        pool.install(|| (0..250u32).into_par_iter().for_each(|_| progress.inc(1)));
        assert_eq!(progress.position(), 250);
    }
}
