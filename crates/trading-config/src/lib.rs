//! Configuration management.

mod settings;

pub use settings::{
    AppSettings, BotConfig, BrokerSettings, LoggingConfig, NotifySettings, ReportSettings,
    StateSettings, StrategySettings,
};

use config::{Config, ConfigError, Environment, File};
use std::path::Path;

/// Load configuration from an optional TOML file and the environment.
///
/// Every key can be overridden with `TRADING__<SECTION>__<KEY>`. Missing
/// keys take their defaults.
pub fn load_config(path: Option<&Path>) -> Result<BotConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    let config = builder
        .add_source(
            Environment::with_prefix("TRADING")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use trading_core::types::{FillPolicy, Timeframe};
    use trading_risk::StopLossPolicy;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let file = write_config(
            r#"
[broker]
symbol = "EURUSD"
lot_size = 0.05
fill_policy = "IOC"

[strategy]
timeframe = "15m"

[exits]
initial_stop = "band"
initial_rung = 2
"#,
        );

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.broker.symbol, "EURUSD");
        assert_eq!(config.broker.lot_size, dec!(0.05));
        assert_eq!(config.broker.magic, 234000);
        assert_eq!(config.fill_policy().unwrap(), FillPolicy::Ioc);
        assert_eq!(config.timeframe().unwrap(), Timeframe::Minute15);
        assert_eq!(config.exits.initial_stop, StopLossPolicy::Band);
        assert_eq!(config.exits.initial_rung, 2);
        assert_eq!(config.exits.atr_period, 14);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_text_loads_back() {
        let text = toml::to_string_pretty(&BotConfig::default()).unwrap();
        let file = write_config(&text);

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config, BotConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/bot.toml"))).is_err());
    }
}
