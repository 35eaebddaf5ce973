//! CLI entry point for the weather/energy pipeline.
//!
//! A run fetches both sources sequentially and always attempts to write both
//! CSV files, even when one source produced nothing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use weather_energy_pipeline::{
    config::PipelineConfig,
    pipeline::{run, write_collection},
    window::DateWindow,
};

#[derive(Parser)]
#[command(name = "weather_energy_pipeline")]
#[command(about = "Fetch NOAA weather and EIA energy demand into CSV", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once (the default)
    Run {
        /// JSON config file with credentials and entities
        #[arg(short, long, default_value = "config/config.json")]
        config: PathBuf,

        /// Directory to write the CSV files to (overrides the config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the date window a run started now would query
    Window,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _log_guard = init_tracing();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run {
        config: PathBuf::from("config/config.json"),
        output_dir: None,
    }) {
        Commands::Run { config, output_dir } => run_pipeline(&config, output_dir).await?,
        Commands::Window => {
            let window = DateWindow::current();
            println!("start={} end={}", window.start_str(), window.end_str());
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
///
/// The returned guard flushes the file writer when dropped at process exit.
fn init_tracing() -> WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/pipeline.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("pipeline.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_filter =
        EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let json_filter =
        EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug"));

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter);

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(json_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

/// Loads config, collects both sources and writes both CSVs.
///
/// An unusable config file does not stop the run: defaults are used, both
/// files are written and the config error is returned afterwards.
#[tracing::instrument(skip_all, fields(config = %config_path.display()))]
async fn run_pipeline(config_path: &Path, output_dir: Option<PathBuf>) -> Result<()> {
    info!("Pipeline started");

    let (config, config_error) = PipelineConfig::load_or_default(config_path);
    let config = config.with_env_overrides();
    let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());

    let collection = run(&config).await;

    let (weather_path, energy_path) = write_collection(&output_dir, &collection)
        .inspect_err(|e| error!(error = %e, "Writing outputs failed"))
        .context("writing pipeline outputs")?;

    info!(
        window = %collection.window,
        weather_rows = collection.weather.len(),
        energy_rows = collection.energy.len(),
        weather_path = %weather_path.display(),
        energy_path = %energy_path.display(),
        "Pipeline completed"
    );

    if let Some(e) = config_error {
        return Err(e).with_context(|| format!("loading config from {}", config_path.display()));
    }
    Ok(())
}
