use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use aqi_pipeline::config::{load_config, PipelineConfig};
use aqi_pipeline::metrics::METRICS;
use aqi_pipeline::pipeline::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "aqi_pipeline")]
#[command(about = "Hourly air quality index from raw station readings", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "AQI_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the raw, clean and result tables
    #[arg(long, global = true, env = "AQI_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Number of worker threads (defaults to the CPU count)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Hide progress bars and the closing summary
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Raw crawler table -> clean hourly table
    Clean {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Clean hourly table -> AQI table
    Aqi {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Both stages in sequence
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        clean: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn resolve_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(folder) = &cli.data_folder {
        config.data_folder = folder.clone();
    }
    if cli.workers.is_some() {
        config.workers = cli.workers;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    info!("Data folder: {}", config.data_folder.display());

    let pipeline = Pipeline::new(config, cli.quiet).context("Failed to initialise pipeline")?;
    let config = pipeline.config();

    match &cli.command {
        Command::Clean { input, output } => {
            let input = input.clone().unwrap_or_else(|| config.raw_path());
            let output = output.clone().unwrap_or_else(|| config.clean_path());
            pipeline
                .run_clean_stage(&input, &output)
                .with_context(|| format!("Clean stage failed for {}", input.display()))?;
        }
        Command::Aqi { input, output } => {
            let input = input.clone().unwrap_or_else(|| config.clean_path());
            let output = output.clone().unwrap_or_else(|| config.result_path());
            pipeline
                .run_aqi_stage(&input, &output)
                .with_context(|| format!("AQI stage failed for {}", input.display()))?;
        }
        Command::Run { input, clean, output } => {
            let input = input.clone().unwrap_or_else(|| config.raw_path());
            let clean = clean.clone().unwrap_or_else(|| config.clean_path());
            let output = output.clone().unwrap_or_else(|| config.result_path());
            pipeline
                .run_clean_stage(&input, &clean)
                .with_context(|| format!("Clean stage failed for {}", input.display()))?;
            pipeline
                .run_aqi_stage(&clean, &output)
                .with_context(|| format!("AQI stage failed for {}", clean.display()))?;
        }
    }

    if !cli.quiet {
        METRICS.lock().print_summary();
    }
    Ok(())
}
