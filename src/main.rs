//! Trading bot CLI application.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use trading_config::load_config;
use trading_core::traits::ReportSink;
use trading_monitor::{setup_logging, CsvReportSink, LoggingOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::DefaultConfig) {
        return cli::commands::default_config::run();
    }

    let config = load_config(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from the environment".to_string(),
    })?;

    // The report sink doubles as the activity log target.
    let reports: Option<Arc<dyn ReportSink>> = match (&cli.command, config.report.enabled) {
        (Commands::Paper(_), true) => Some(Arc::new(
            CsvReportSink::open(&config.report.dir)
                .with_context(|| format!("Failed to open report directory {}", config.report.dir))?,
        )),
        _ => None,
    };

    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| config.logging.level.clone());
    let _log_guard = setup_logging(LoggingOptions {
        level: &level,
        json: cli.json_logs || config.logging.format == "json",
        file_dir: config.logging.dir.as_deref().map(Path::new),
        activity: reports.clone(),
    })?;

    match cli.command {
        Commands::Paper(args) => cli::commands::paper::run(args, &config, reports).await,
        Commands::State => cli::commands::state::run(&config),
        Commands::Summary => cli::commands::summary::run(&config),
        Commands::ValidateConfig => cli::commands::validate::run(&config),
        Commands::DefaultConfig => cli::commands::default_config::run(),
    }
}
