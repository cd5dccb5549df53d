//! Core types and traits for the trading bot.
//!
//! This crate provides the foundational building blocks including:
//! - Market data types (Bar, Timeframe)
//! - Broker views (BrokerPosition, Deal, OrderRequest)
//! - Managed trade bookkeeping (ManagedTradeRecord, TradeRecord)
//! - Indicator outputs (Signal, Band, PriceLadder)
//! - Collaborator traits for the broker, indicators, notifications and reports

pub mod types;
pub mod traits;
pub mod error;

pub use error::{TradingError, TradingResult};
pub use types::*;
pub use traits::*;
