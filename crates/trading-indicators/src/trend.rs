//! Trend levels.
//!
//! The trend turns up when a candle prints the rolling `length` high and
//! turns down when it prints the rolling low. A candle doing both ends
//! down. A flip emits a signal on the candle where it happens.

use trading_core::types::{Bar, Signal};

/// Trend-levels signal generator.
#[derive(Debug, Clone)]
pub struct TrendLevels {
    length: usize,
}

impl TrendLevels {
    pub fn new(length: usize) -> Self {
        assert!(length > 0, "Length must be greater than 0");
        Self { length }
    }

    /// Uptrend flag per candle.
    pub fn trend(&self, bars: &[Bar]) -> Vec<bool> {
        let mut trend = Vec::with_capacity(bars.len());
        let mut up = true;

        for (i, bar) in bars.iter().enumerate() {
            if i > 0 {
                // Rolling window includes the current candle and grows from
                // the start of the series until it reaches `length`.
                let start = (i + 1).saturating_sub(self.length);
                let window = &bars[start..=i];
                let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
                let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);

                if bar.high == highest {
                    up = true;
                }
                if bar.low == lowest {
                    up = false;
                }
            }
            trend.push(up);
        }

        trend
    }

    /// Signal per candle, same length as the input.
    pub fn calculate(&self, bars: &[Bar]) -> Vec<Signal> {
        let trend = self.trend(bars);
        let mut signals = Vec::with_capacity(trend.len());

        for (i, &up) in trend.iter().enumerate() {
            let signal = match (i.checked_sub(1).map(|p| trend[p]), up) {
                (Some(false), true) => Signal::Buy,
                (Some(true), false) => Signal::Sell,
                _ => Signal::Hold,
            };
            signals.push(signal);
        }

        signals
    }
}
