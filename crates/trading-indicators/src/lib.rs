//! Technical indicators for entries and dynamic exits.
//!
//! This crate provides the reference implementations behind
//! [`IndicatorLibrary`]:
//! - Trend levels (entry signal)
//! - Gaussian bands (trailing stop reference)
//! - Gann ladder (take-profit rungs)
//! - ATR (initial risk sizing)

pub mod ladder;
pub mod trend;
pub mod volatility;

pub use ladder::GannLadder;
pub use trend::TrendLevels;
pub use volatility::{Atr, GaussianBands, GaussianMa};

use trading_core::traits::IndicatorLibrary;
use trading_core::types::{Band, Bar, LadderBasis, PriceLadder, Signal};

/// The default indicator set.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardIndicators;

impl IndicatorLibrary for StandardIndicators {
    fn trend_signal(&self, candles: &[Bar], length: usize) -> Vec<Signal> {
        if length == 0 {
            return vec![Signal::Hold; candles.len()];
        }
        TrendLevels::new(length).calculate(candles)
    }

    fn volatility_band(&self, candles: &[Bar], length: usize, distance: f64) -> Vec<Band> {
        if length == 0 || distance <= 0.0 {
            return vec![];
        }
        GaussianBands::new(length, distance).calculate(candles)
    }

    fn price_ladder(&self, daily: &[Bar], basis: LadderBasis) -> Option<PriceLadder> {
        GannLadder::new(basis).calculate(daily)
    }

    fn average_true_range(&self, candles: &[Bar], period: usize) -> Vec<f64> {
        if period == 0 {
            return vec![];
        }
        Atr::new(period).calculate_bars(candles)
    }
}
