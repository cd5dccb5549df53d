//! Order types and structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::DataError;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Get the opposite direction.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Get the sign for price arithmetic (+1 for long, -1 for short).
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// True when `candidate` is strictly better than `reference` for this direction.
    ///
    /// "Better" means higher for a long and lower for a short, which is the
    /// favorable direction for both stops and targets.
    #[inline]
    pub fn is_beyond(&self, candidate: f64, reference: f64) -> bool {
        match self {
            Direction::Long => candidate > reference,
            Direction::Short => candidate < reference,
        }
    }

    /// True when `price` has reached `level` moving in the favorable direction.
    #[inline]
    pub fn has_reached(&self, price: f64, level: f64) -> bool {
        match self {
            Direction::Long => price >= level,
            Direction::Short => price <= level,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "BUY"),
            Direction::Short => write!(f, "SELL"),
        }
    }
}

/// How the venue should fill a market order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FillPolicy {
    /// Fill or kill
    #[default]
    #[serde(rename = "FOK")]
    Fok,
    /// Immediate or cancel
    #[serde(rename = "IOC")]
    Ioc,
    /// Partial fills allowed, remainder stays working
    #[serde(rename = "RETURN")]
    Return,
}

impl FromStr for FillPolicy {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FOK" => Ok(FillPolicy::Fok),
            "IOC" => Ok(FillPolicy::Ioc),
            "RETURN" => Ok(FillPolicy::Return),
            _ => Err(DataError::InvalidFillPolicy(s.to_string())),
        }
    }
}

/// Market order request for opening a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Symbol to trade
    pub symbol: String,
    /// Long or short
    pub direction: Direction,
    /// Volume in lots
    pub volume: Decimal,
    /// Quoted price the order was priced against
    pub price: f64,
    /// Initial stop-loss
    pub stop_loss: Option<f64>,
    /// Initial take-profit
    pub take_profit: Option<f64>,
    /// Allowed slippage in points
    pub deviation: u32,
    /// Owner tag stamped on the resulting position
    pub magic: u64,
    /// Fill policy
    pub fill_policy: FillPolicy,
    /// Free-form order comment
    pub comment: String,
}

impl OrderRequest {
    /// Create a market order request.
    pub fn market(
        symbol: impl Into<String>,
        direction: Direction,
        volume: Decimal,
        price: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            volume,
            price,
            stop_loss: None,
            take_profit: None,
            deviation: 20,
            magic: 0,
            fill_policy: FillPolicy::default(),
            comment: String::new(),
        }
    }

    /// Attach protective levels.
    pub fn with_levels(mut self, stop_loss: Option<f64>, take_profit: Option<f64>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    /// Stamp the owner tag.
    pub fn with_magic(mut self, magic: u64) -> Self {
        self.magic = magic;
        self
    }

    /// Set execution parameters.
    pub fn with_execution(mut self, fill_policy: FillPolicy, deviation: u32) -> Self {
        self.fill_policy = fill_policy;
        self.deviation = deviation;
        self
    }

    /// Set the order comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Result of an accepted market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderOutcome {
    /// Ticket of the opened position
    pub ticket: u64,
    /// Executed price
    pub price: f64,
    /// Executed volume
    pub volume: Decimal,
}
