//! Indicator trait definitions.

use crate::error::IndicatorError;
use crate::types::{Band, Bar, LadderBasis, PriceLadder, Signal};

/// Trait for single-series technical indicators.
///
/// Indicators process price data and produce derived values
/// useful for trading decisions.
pub trait Indicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Calculate indicator values for the given data.
    ///
    /// The result holds one value per full window, so it is shorter than the
    /// input by `period() - 1` entries.
    fn calculate(&self, data: &[f64]) -> Vec<Self::Output>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Validate that there's enough data.
    fn validate_data(&self, data: &[f64]) -> Result<(), IndicatorError> {
        if data.len() < self.period() {
            return Err(IndicatorError::InsufficientData {
                required: self.period(),
                available: data.len(),
            });
        }
        Ok(())
    }
}

/// The pure transforms the controllers depend on.
///
/// All methods are side-effect free; an implementation can be swapped without
/// touching the controllers.
pub trait IndicatorLibrary: Send + Sync {
    /// Trend signal per candle, same length as `candles`.
    fn trend_signal(&self, candles: &[Bar], length: usize) -> Vec<Signal>;

    /// Volatility band per candle with a full window, newest last.
    fn volatility_band(&self, candles: &[Bar], length: usize, distance: f64) -> Vec<Band>;

    /// Take-profit ladder from daily candles (today's forming candle last).
    ///
    /// `None` when there is not enough history or the reference is unusable.
    fn price_ladder(&self, daily: &[Bar], basis: LadderBasis) -> Option<PriceLadder>;

    /// Average true range per candle with a full window, newest last.
    fn average_true_range(&self, candles: &[Bar], period: usize) -> Vec<f64>;
}
