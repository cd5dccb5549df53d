//! Managed trade bookkeeping and closed-trade report rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BrokerPosition, Direction};

/// How a managed trade came under the bot's control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// Opened from flat with a ladder take-profit
    Ladder,
    /// Opened from flat with ATR-derived levels
    #[serde(rename = "ATR")]
    Atr,
    /// Opened as the second leg of a reversal
    Reversal,
    /// Manual position taken over by reconciliation
    #[serde(rename = "Adopted/Manual")]
    AdoptedManual,
    /// Owned position re-registered after its record was lost
    Recovered,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryType::Ladder => "Ladder",
            EntryType::Atr => "ATR",
            EntryType::Reversal => "Reversal",
            EntryType::AdoptedManual => "Adopted/Manual",
            EntryType::Recovered => "Recovered",
        };
        write!(f, "{}", s)
    }
}

/// A trade this process manages, as persisted in the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedTradeRecord {
    pub ticket: u64,
    pub symbol: String,
    pub entry_price: f64,
    pub direction: Direction,
    pub entry_type: EntryType,
    pub tp_level: Option<f64>,
    pub sl_level: Option<f64>,
    pub opened_at: DateTime<Utc>,
}

impl ManagedTradeRecord {
    /// Build a record for a position the bot just opened.
    pub fn opened(
        ticket: u64,
        symbol: impl Into<String>,
        direction: Direction,
        entry_price: f64,
        entry_type: EntryType,
    ) -> Self {
        Self {
            ticket,
            symbol: symbol.into(),
            entry_price,
            direction,
            entry_type,
            tp_level: None,
            sl_level: None,
            opened_at: Utc::now(),
        }
    }

    /// Build a record mirroring a broker position.
    pub fn from_position(position: &BrokerPosition, entry_type: EntryType) -> Self {
        Self {
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            entry_price: position.price_open,
            direction: position.direction,
            entry_type,
            tp_level: position.tp,
            sl_level: position.sl,
            opened_at: position.opened_at,
        }
    }

    /// Set the persisted protective levels.
    pub fn with_levels(mut self, sl_level: Option<f64>, tp_level: Option<f64>) -> Self {
        self.sl_level = sl_level;
        self.tp_level = tp_level;
        self
    }
}

/// One row of the closed-trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(rename = "Ticket #")]
    pub ticket: u64,
    #[serde(rename = "Entry Time")]
    pub entry_time: DateTime<Utc>,
    #[serde(rename = "Exit Time")]
    pub exit_time: DateTime<Utc>,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Timeframe")]
    pub timeframe: String,
    #[serde(rename = "Direction")]
    pub direction: Direction,
    #[serde(rename = "Lot Size")]
    pub volume: Decimal,
    #[serde(rename = "Entry Price")]
    pub entry_price: f64,
    #[serde(rename = "Exit Price")]
    pub exit_price: f64,
    #[serde(rename = "Take Profit")]
    pub take_profit: Option<f64>,
    #[serde(rename = "Stop Loss")]
    pub stop_loss: Option<f64>,
    #[serde(rename = "Profit/Loss ($)")]
    pub profit: Decimal,
    #[serde(rename = "Entry Type")]
    pub entry_type: EntryType,
    #[serde(rename = "Exit Reason")]
    pub exit_reason: String,
}

impl TradeRecord {
    /// Check if the trade closed in profit.
    pub fn is_win(&self) -> bool {
        self.profit > Decimal::ZERO
    }
}

/// Levels and readings behind one entry attempt, written before the order
/// is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDecision {
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Direction")]
    pub direction: Direction,
    #[serde(rename = "Entry Price")]
    pub price: f64,
    #[serde(rename = "Stop Loss")]
    pub stop_loss: Option<f64>,
    #[serde(rename = "Take Profit")]
    pub take_profit: Option<f64>,
    #[serde(rename = "Entry Type")]
    pub entry_type: EntryType,
    #[serde(rename = "ATR")]
    pub atr: Option<f64>,
    #[serde(rename = "Volatility Zone")]
    pub zone: Option<String>,
}
