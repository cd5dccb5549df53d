//! Broker-side position and deal views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Direction;

/// Owner tag of positions opened by hand in the terminal.
pub const MANUAL_MAGIC: u64 = 0;

/// Which open positions to request from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerFilter {
    /// Positions stamped with this owner tag
    Owned(u64),
    /// Positions without an owner tag
    Manual,
    /// Every position on the symbol
    Any,
}

impl OwnerFilter {
    /// Check whether a position's owner tag passes the filter.
    pub fn matches(&self, magic: u64) -> bool {
        match self {
            OwnerFilter::Owned(tag) => magic == *tag,
            OwnerFilter::Manual => magic == MANUAL_MAGIC,
            OwnerFilter::Any => true,
        }
    }
}

/// An open position as reported by the broker.
///
/// Read-only snapshot; it is re-fetched every tick and never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    /// Broker-assigned ticket
    pub ticket: u64,
    /// Symbol
    pub symbol: String,
    /// Long or short
    pub direction: Direction,
    /// Volume in lots
    pub volume: Decimal,
    /// Average open price
    pub price_open: f64,
    /// Current stop-loss, if any
    pub sl: Option<f64>,
    /// Current take-profit, if any
    pub tp: Option<f64>,
    /// Owner tag
    pub magic: u64,
    /// Open time
    pub opened_at: DateTime<Utc>,
}

impl BrokerPosition {
    /// Check if this position was opened by hand.
    pub fn is_manual(&self) -> bool {
        self.magic == MANUAL_MAGIC
    }
}

/// Whether a deal opened or closed exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealEntry {
    In,
    Out,
    InOut,
    OutBy,
}

impl DealEntry {
    /// Check if the deal reduced or closed the position.
    pub fn is_exit(&self) -> bool {
        matches!(self, DealEntry::Out | DealEntry::InOut | DealEntry::OutBy)
    }
}

/// Why a deal happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealReason {
    Client,
    Expert,
    StopLoss,
    TakeProfit,
    StopOut,
    Other,
}

impl std::fmt::Display for DealReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DealReason::Client => "Manual Close",
            DealReason::Expert => "Bot Close",
            DealReason::StopLoss => "Stop Loss",
            DealReason::TakeProfit => "Take Profit",
            DealReason::StopOut => "Stop Out",
            DealReason::Other => "Other",
        };
        write!(f, "{}", s)
    }
}

/// A single execution belonging to a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    /// Deal id
    pub id: u64,
    /// Ticket of the position the deal belongs to
    pub position_ticket: u64,
    /// Direction of the deal itself (an exit deal is opposite to the position)
    pub direction: Direction,
    /// Entry kind
    pub entry: DealEntry,
    /// Volume in lots
    pub volume: Decimal,
    /// Execution price
    pub price: f64,
    /// Gross profit booked by the deal
    pub profit: Decimal,
    /// Commission charged
    pub commission: Decimal,
    /// Swap charged
    pub swap: Decimal,
    /// Execution time
    pub time: DateTime<Utc>,
    /// Execution reason
    pub reason: DealReason,
}

/// Realized outcome of a closed position, derived from its deals.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub entry_time: Option<DateTime<Utc>>,
    pub entry_price: Option<f64>,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub volume: Decimal,
    /// Net of commission and swap
    pub profit: Decimal,
    pub exit_reason: DealReason,
}

impl Settlement {
    /// Summarize a position's deal history.
    ///
    /// Returns `None` until at least one exit deal is indexed, which is the
    /// normal state for a short while after the venue closes a position.
    pub fn from_deals(deals: &[Deal]) -> Option<Self> {
        let last_exit = deals
            .iter()
            .filter(|d| d.entry.is_exit())
            .max_by_key(|d| d.time)?;
        let entry = deals
            .iter()
            .filter(|d| d.entry == DealEntry::In)
            .min_by_key(|d| d.time);

        let profit = deals
            .iter()
            .map(|d| d.profit + d.commission + d.swap)
            .sum();
        let volume = deals
            .iter()
            .filter(|d| d.entry.is_exit())
            .map(|d| d.volume)
            .sum();

        Some(Self {
            entry_time: entry.map(|d| d.time),
            entry_price: entry.map(|d| d.price),
            exit_time: last_exit.time,
            exit_price: last_exit.price,
            volume,
            profit,
            exit_reason: last_exit.reason,
        })
    }
}
