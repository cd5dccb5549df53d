//! Error types for the trading bot.

use thiserror::Error;

/// Top-level trading system error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broker-specific errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Modification rejected for ticket {ticket}: {reason}")]
    ModifyRejected { ticket: u64, reason: String },

    #[error("Close rejected for ticket {ticket}: {reason}")]
    CloseRejected { ticket: u64, reason: String },

    #[error("Position not found: {0}")]
    PositionNotFound(u64),

    #[error("No price available for {0}")]
    PriceUnavailable(String),
}

/// Data source errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Invalid fill policy: {0}")]
    InvalidFillPolicy(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Indicator calculation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("Insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Persistent state errors.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("State file {path} could not be accessed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("State file {path} is corrupt and could not be archived: {source}")]
    Quarantine {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("State serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Report sink errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report file {path} could not be written: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Report encoding failed: {0}")]
    Csv(String),
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;
