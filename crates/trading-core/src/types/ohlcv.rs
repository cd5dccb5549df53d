//! OHLCV (Open, High, Low, Close, Volume) candle type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compact OHLCV bar.
/// Uses f64 for fast indicator calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time, Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Tick volume
    pub volume: f64,
}

impl Bar {
    /// Create a new bar.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Get the timestamp as a DateTime.
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Calculate the true range (used for ATR).
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) => {
                let hl = self.high - self.low;
                let hc = (self.high - pc).abs();
                let lc = (self.low - pc).abs();
                hl.max(hc).max(lc)
            }
            None => self.high - self.low,
        }
    }
}

/// Drop the still-forming bar from a broker candle list.
///
/// Brokers return candles oldest to newest with the in-progress bar last.
pub fn closed_bars(bars: &[Bar]) -> &[Bar] {
    match bars.split_last() {
        Some((_, closed)) => closed,
        None => bars,
    }
}

/// Extract close prices as a vector.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_true_range() {
        let bar = Bar::new(1000, 100.0, 110.0, 95.0, 105.0, 1000000.0);

        // Without previous close
        assert!((bar.true_range(None) - 15.0).abs() < 0.001);

        // With previous close that creates gap
        assert!((bar.true_range(Some(90.0)) - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_closed_bars_drops_forming_bar() {
        let bars = vec![
            Bar::new(1, 100.0, 101.0, 99.0, 100.5, 10.0),
            Bar::new(2, 100.5, 102.0, 100.0, 101.5, 10.0),
            Bar::new(3, 101.5, 101.6, 101.4, 101.5, 1.0),
        ];

        let closed = closed_bars(&bars);
        assert_eq!(closed.len(), 2);
        assert_eq!(closed.last().unwrap().timestamp, 2);
        assert!(closed_bars(&[]).is_empty());
    }

    #[test]
    fn test_datetime_from_millis() {
        let bar = Bar::new(86_400_000, 1.0, 1.0, 1.0, 1.0, 0.0);
        assert_eq!(bar.datetime().timestamp(), 86_400);
    }
}
