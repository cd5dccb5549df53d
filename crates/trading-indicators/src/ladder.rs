//! Gann square-root price ladder.
//!
//! Levels sit at `(sqrt(reference) ± fraction)^2`. The reference is a daily
//! price picked by [`LadderBasis`].

use tracing::warn;
use trading_core::types::{Bar, LadderBasis, LadderSide, PriceLadder};

/// Offset of the entry rung.
const ENTRY_FRACTION: f64 = 0.125;
/// Offset of the protective stop.
const STOP_FRACTION: f64 = 0.0625;
/// Offsets of the targets beyond the entry rung.
const TARGET_FRACTIONS: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

/// Gann ladder builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct GannLadder {
    basis: LadderBasis,
}

impl GannLadder {
    pub fn new(basis: LadderBasis) -> Self {
        Self { basis }
    }

    /// Pick the reference price from daily candles.
    ///
    /// The last candle is today (still forming), the one before it yesterday.
    pub fn reference(&self, daily: &[Bar]) -> Option<f64> {
        if daily.len() < 2 {
            warn!(
                available = daily.len(),
                "Insufficient daily data for price ladder, need at least 2 days"
            );
            return None;
        }
        let today = &daily[daily.len() - 1];
        let previous = &daily[daily.len() - 2];

        Some(match self.basis {
            LadderBasis::TodaysOpen => today.open,
            LadderBasis::PreviousDayHigh => previous.high,
            LadderBasis::PreviousDayLow => previous.low,
            LadderBasis::PreviousDayClose => previous.close,
        })
    }

    /// Build the ladder, or `None` when the reference is unusable.
    pub fn calculate(&self, daily: &[Bar]) -> Option<PriceLadder> {
        let reference = self.reference(daily)?;
        Self::from_reference(reference)
    }

    /// Build the ladder around an explicit reference price.
    pub fn from_reference(reference: f64) -> Option<PriceLadder> {
        if !reference.is_finite() || reference <= 0.0 {
            warn!(reference, "Cannot build price ladder from non-positive reference price");
            return None;
        }
        let root = reference.sqrt();

        let buy_rungs = std::iter::once(ENTRY_FRACTION)
            .chain(TARGET_FRACTIONS)
            .map(|f| (root + f).powi(2))
            .collect();

        // Below the reference the square only stays monotonic while the
        // root stays positive.
        let sell_rungs: Vec<f64> = std::iter::once(ENTRY_FRACTION)
            .chain(TARGET_FRACTIONS)
            .take_while(|&f| root - f > 0.0)
            .map(|f| (root - f).powi(2))
            .collect();

        Some(PriceLadder {
            reference,
            buy: LadderSide {
                rungs: buy_rungs,
                stop_loss: (root - STOP_FRACTION).powi(2),
            },
            sell: LadderSide {
                rungs: sell_rungs,
                stop_loss: (root + STOP_FRACTION).powi(2),
            },
        })
    }
}
