//! Default configuration command.

use anyhow::{Context, Result};
use trading_config::BotConfig;

pub fn run() -> Result<()> {
    let text = toml::to_string_pretty(&BotConfig::default()).context("Failed to render default configuration")?;
    print!("{text}");
    Ok(())
}
