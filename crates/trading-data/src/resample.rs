//! Candle resampling.

use trading_core::types::{Bar, Timeframe};

/// Aggregate candles into `timeframe` buckets aligned to the epoch.
///
/// Input must be sorted oldest first and finer than `timeframe`.
pub fn resample(bars: &[Bar], timeframe: Timeframe) -> Vec<Bar> {
    let width = timeframe.as_millis();
    let mut out: Vec<Bar> = Vec::new();

    for bar in bars {
        let bucket = bar.timestamp - bar.timestamp.rem_euclid(width);
        match out.last_mut() {
            Some(current) if current.timestamp == bucket => {
                current.high = current.high.max(bar.high);
                current.low = current.low.min(bar.low);
                current.close = bar.close;
                current.volume += bar.volume;
            }
            _ => out.push(Bar::new(bucket, bar.open, bar.high, bar.low, bar.close, bar.volume)),
        }
    }

    out
}
