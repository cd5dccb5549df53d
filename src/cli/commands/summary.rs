//! Monthly summary command.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use trading_config::BotConfig;
use trading_monitor::CsvReportSink;

pub fn run(config: &BotConfig) -> Result<()> {
    let sink = CsvReportSink::open(&config.report.dir)
        .with_context(|| format!("Failed to open report directory {}", config.report.dir))?;
    let trades = sink.trade_history()?;
    let months = sink.monthly_summary()?;

    if months.is_empty() {
        println!("No closed trades in {}", sink.dir().display());
        return Ok(());
    }

    println!("{:<8} {:>14} {:>14} {:>14}", "Month", "Profit ($)", "Loss ($)", "Net ($)");
    for m in &months {
        println!(
            "{:<8} {:>14} {:>14} {:>14}",
            m.month,
            m.total_profit.round_dp(2),
            m.total_loss.round_dp(2),
            m.net.round_dp(2)
        );
    }

    let net: Decimal = months.iter().map(|m| m.net).sum();
    let wins = trades.iter().filter(|t| t.is_win()).count();
    println!();
    println!("Trades: {} ({} won, {} lost)", trades.len(), wins, trades.len() - wins);
    println!("Net: ${}", net.round_dp(2));

    Ok(())
}
