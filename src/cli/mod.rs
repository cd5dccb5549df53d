//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trading-bot")]
#[command(author, version, about = "Trend-following bot with state reconciliation and dynamic exits")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TRADING_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overriding the configured one
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a candle file through the bot against a simulated venue
    Paper(PaperArgs),
    /// List the persisted trade records
    State,
    /// Print the monthly profit summary
    Summary,
    /// Validate configuration
    ValidateConfig,
    /// Print the default configuration as TOML
    DefaultConfig,
}

#[derive(clap::Args)]
pub struct PaperArgs {
    /// Candle file (CSV)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Candles loaded before the first tick
    #[arg(long, default_value = "200")]
    pub warmup: usize,

    /// Aggregate the file's candles into the configured timeframe
    #[arg(long)]
    pub resample: bool,
}
