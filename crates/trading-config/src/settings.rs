//! Configuration structures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use trading_core::error::TradingError;
use trading_core::types::{FillPolicy, Timeframe};
use trading_engine::{EntryConfig, ReconcileConfig, ScheduleConfig};
use trading_risk::ExitConfig;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BotConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub strategy: StrategySettings,
    #[serde(default)]
    pub exits: ExitConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub state: StateSettings,
    #[serde(default)]
    pub report: ReportSettings,
    #[serde(default)]
    pub notify: NotifySettings,
}

/// General app settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "trading-bot".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for daily log files
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            dir: None,
        }
    }
}

/// Instrument and order settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub symbol: String,
    /// Owner tag stamped on every bot order
    pub magic: u64,
    pub lot_size: Decimal,
    /// `FOK`, `IOC` or `RETURN`
    pub fill_policy: String,
    pub deviation: u32,
    /// Ask-bid spread of the simulated venue
    pub spread: f64,
    /// Units per lot of the simulated venue
    pub contract_size: Decimal,
    /// Commission per lot and side of the simulated venue
    pub commission_per_lot: Decimal,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            symbol: "XAUUSD".to_string(),
            magic: 234000,
            lot_size: dec!(0.01),
            fill_policy: "FOK".to_string(),
            deviation: 20,
            spread: 0.0,
            contract_size: dec!(100),
            commission_per_lot: Decimal::ZERO,
        }
    }
}

/// Entry signal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    /// Candle timeframe, e.g. `5m` or `1h`
    pub timeframe: String,
    pub trend_length: usize,
    /// Candles fetched per tick
    pub candle_count: usize,
    /// Pause between closing and reopening on a reversal
    pub reversal_delay_ms: u64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            timeframe: "5m".to_string(),
            trend_length: 30,
            candle_count: 200,
            reversal_delay_ms: 1000,
        }
    }
}

/// Persisted trade state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    pub path: String,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            path: "trade_state.json".to_string(),
        }
    }
}

/// Trade history and activity reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub enabled: bool,
    pub dir: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "reports".to_string(),
        }
    }
}

/// Telegram alerts. Credentials are read from the named variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub enabled: bool,
    pub token_env: String,
    pub chat_id_env: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            token_env: "TELEGRAM_TOKEN".to_string(),
            chat_id_env: "TELEGRAM_CHAT_ID".to_string(),
        }
    }
}

impl BotConfig {
    pub fn timeframe(&self) -> Result<Timeframe, TradingError> {
        self.strategy
            .timeframe
            .parse()
            .map_err(|e| TradingError::Config(format!("strategy.timeframe: {e}")))
    }

    pub fn fill_policy(&self) -> Result<FillPolicy, TradingError> {
        self.broker
            .fill_policy
            .parse()
            .map_err(|e| TradingError::Config(format!("broker.fill_policy: {e}")))
    }

    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(&self.state.path)
    }

    /// State file of paper replays, `<stem>_paper.<ext>` beside the live one.
    pub fn paper_state_path(&self) -> PathBuf {
        let path = self.state_path();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trade_state".to_string());
        let name = match path.extension() {
            Some(ext) => format!("{stem}_paper.{}", ext.to_string_lossy()),
            None => format!("{stem}_paper"),
        };
        path.with_file_name(name)
    }

    /// Reject settings the bot cannot run with.
    pub fn validate(&self) -> Result<(), TradingError> {
        if self.broker.symbol.trim().is_empty() {
            return Err(TradingError::Config("broker.symbol cannot be empty".to_string()));
        }
        if self.broker.lot_size <= Decimal::ZERO {
            return Err(TradingError::Config("broker.lot_size must be positive".to_string()));
        }
        if self.broker.contract_size <= Decimal::ZERO {
            return Err(TradingError::Config("broker.contract_size must be positive".to_string()));
        }
        if self.broker.spread < 0.0 {
            return Err(TradingError::Config("broker.spread cannot be negative".to_string()));
        }
        if self.broker.magic == 0 {
            return Err(TradingError::Config(
                "broker.magic cannot be 0, which marks manual trades".to_string(),
            ));
        }
        self.fill_policy()?;

        let timeframe = self.timeframe()?;
        if timeframe == Timeframe::Daily {
            return Err(TradingError::Config(
                "strategy.timeframe must be intraday".to_string(),
            ));
        }
        if self.strategy.trend_length == 0 {
            return Err(TradingError::Config(
                "strategy.trend_length must be greater than 0".to_string(),
            ));
        }
        let needed = self
            .strategy
            .trend_length
            .max(self.exits.band_length)
            .max(self.exits.atr_period + 1)
            + 1;
        if self.strategy.candle_count < needed {
            return Err(TradingError::Config(format!(
                "strategy.candle_count must be at least {needed}"
            )));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(TradingError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }
        if self.state.path.trim().is_empty() {
            return Err(TradingError::Config("state.path cannot be empty".to_string()));
        }

        self.exits.validate()?;
        self.reconcile.validate()?;
        self.schedule.validate()?;
        Ok(())
    }

    /// Entry parameters for the engine.
    pub fn entry_config(&self) -> Result<EntryConfig, TradingError> {
        Ok(EntryConfig {
            symbol: self.broker.symbol.clone(),
            timeframe: self.timeframe()?,
            lot_size: self.broker.lot_size,
            magic: self.broker.magic,
            fill_policy: self.fill_policy()?,
            deviation: self.broker.deviation,
            trend_length: self.strategy.trend_length,
            candle_count: self.strategy.candle_count,
            daily_candle_count: self.reconcile.daily_candle_count,
            reversal_delay: Duration::from_millis(self.strategy.reversal_delay_ms),
        })
    }
}
