//! Validate configuration command.

use anyhow::Result;
use trading_config::BotConfig;

pub fn run(config: &BotConfig) -> Result<()> {
    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Err(e.into());
    }

    println!("Configuration is valid!");
    println!();
    println!("App: {}", config.app.name);
    println!("Environment: {}", config.app.environment);
    println!("Log level: {}", config.logging.level);
    println!("Symbol: {}", config.broker.symbol);
    println!("Timeframe: {}", config.strategy.timeframe);
    println!("Lot size: {}", config.broker.lot_size);
    println!("Magic: {}", config.broker.magic);
    println!(
        "Initial stop / target: {:?} / {:?}",
        config.exits.initial_stop, config.exits.initial_target
    );
    println!(
        "Trailing stop / take-profit: {} / {}",
        config.exits.trail_stop_loss, config.exits.trail_take_profit
    );
    println!("Adopt manual trades: {}", config.reconcile.adopt_manual);
    println!("State file: {}", config.state.path);
    println!("Telegram alerts: {}", config.notify.enabled);

    Ok(())
}
