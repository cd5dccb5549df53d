//! State listing command.

use anyhow::{Context, Result};
use trading_config::BotConfig;
use trading_state::StateStore;

pub fn run(config: &BotConfig) -> Result<()> {
    let path = config.state_path();
    let store = StateStore::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    let records = store.records()?;

    if records.is_empty() {
        println!("No managed trades in {}", path.display());
        return Ok(());
    }

    let level = |l: Option<f64>| l.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    println!(
        "{:<10} {:<8} {:<5} {:>10} {:>10} {:>10}  {:<15} {}",
        "Ticket", "Symbol", "Side", "Entry", "SL", "TP", "Type", "Opened"
    );
    for r in &records {
        println!(
            "{:<10} {:<8} {:<5} {:>10.2} {:>10} {:>10}  {:<15} {}",
            r.ticket,
            r.symbol,
            r.direction.to_string(),
            r.entry_price,
            level(r.sl_level),
            level(r.tp_level),
            r.entry_type.to_string(),
            r.opened_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("\n{} managed trade(s)", records.len());

    Ok(())
}
