//! Indicator outputs consumed by the controllers.

use serde::{Deserialize, Serialize};

use super::Direction;

/// Per-candle trend signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Signal {
    /// The direction this signal asks for, if any.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Signal::Buy => Some(Direction::Long),
            Signal::Sell => Some(Direction::Short),
            Signal::Hold => None,
        }
    }
}

/// Volatility band value for one candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub mid: f64,
    pub upper: f64,
    pub lower: f64,
}

impl Band {
    /// The boundary a trailing stop follows for `direction`.
    pub fn stop_for(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.lower,
            Direction::Short => self.upper,
        }
    }
}

/// Which daily price anchors the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LadderBasis {
    #[serde(rename = "todays_open")]
    TodaysOpen,
    #[serde(rename = "previous_day_high")]
    PreviousDayHigh,
    #[serde(rename = "previous_day_low")]
    PreviousDayLow,
    #[default]
    #[serde(rename = "previous_day_close")]
    PreviousDayClose,
}

/// One side of a price ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderSide {
    /// Rungs ordered away from the reference; `rungs[0]` is the entry rung
    pub rungs: Vec<f64>,
    /// Protective level on the far side of the reference
    pub stop_loss: f64,
}

impl LadderSide {
    /// The entry rung.
    pub fn entry(&self) -> Option<f64> {
        self.rungs.first().copied()
    }
}

/// Take-profit ladder for both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLadder {
    /// Reference price the rungs were derived from
    pub reference: f64,
    /// Rungs above the reference, ascending
    pub buy: LadderSide,
    /// Rungs below the reference, descending
    pub sell: LadderSide,
}

impl PriceLadder {
    /// The side used by positions of `direction`.
    pub fn side(&self, direction: Direction) -> &LadderSide {
        match direction {
            Direction::Long => &self.buy,
            Direction::Short => &self.sell,
        }
    }

    /// Rung at `index` for `direction`, clamped to the last rung.
    pub fn rung(&self, direction: Direction, index: usize) -> Option<f64> {
        let rungs = &self.side(direction).rungs;
        rungs.get(index).or_else(|| rungs.last()).copied()
    }
}
