//! Volatility indicators.

use trading_core::traits::Indicator;
use trading_core::types::{Band, Bar};

/// Average True Range (ATR).
///
/// Measures market volatility by decomposing the entire range
/// of an asset price for that period.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
}

impl Atr {
    /// Create a new ATR indicator.
    ///
    /// Common period is 14.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }

    /// Calculate ATR from candles.
    ///
    /// The first value lines up with candle `period`, so the output is
    /// `period` entries shorter than the input.
    pub fn calculate_bars(&self, bars: &[Bar]) -> Vec<f64> {
        if bars.len() < self.period + 1 {
            return vec![];
        }

        let tr: Vec<f64> = bars
            .windows(2)
            .map(|pair| pair[1].true_range(Some(pair[0].close)))
            .collect();

        // Calculate ATR using Wilder's smoothing
        let period_f64 = self.period as f64;
        let mut result = Vec::with_capacity(tr.len() - self.period + 1);

        // Initial ATR is SMA of first 'period' true ranges
        let mut atr: f64 = tr[..self.period].iter().sum::<f64>() / period_f64;
        result.push(atr);

        for &tr_val in &tr[self.period..] {
            atr = (atr * (period_f64 - 1.0) + tr_val) / period_f64;
            result.push(atr);
        }

        result
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// Gaussian-weighted moving average.
///
/// Weights follow a bell curve centred towards the newest sample, which
/// smooths like a long average while lagging like a short one.
#[derive(Debug, Clone)]
pub struct GaussianMa {
    period: usize,
    weights: Vec<f64>,
}

impl GaussianMa {
    const OFFSET: f64 = 0.85;
    const SIGMA: f64 = 6.0;

    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        let m = Self::OFFSET * (period as f64 - 1.0);
        let s = period as f64 / Self::SIGMA;
        let raw: Vec<f64> = (0..period)
            .map(|i| (-((i as f64 - m).powi(2)) / (2.0 * s * s)).exp())
            .collect();
        let norm: f64 = raw.iter().sum();
        let weights = raw.into_iter().map(|w| w / norm).collect();
        Self { period, weights }
    }
}

impl Indicator for GaussianMa {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() < self.period {
            return vec![];
        }

        data.windows(self.period)
            .map(|window| window.iter().zip(&self.weights).map(|(x, w)| x * w).sum())
            .collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "GaussianMA"
    }
}

/// Gaussian bands.
///
/// A Gaussian-weighted mid line with boundaries `distance` ATRs away.
#[derive(Debug, Clone)]
pub struct GaussianBands {
    mid: GaussianMa,
    atr: Atr,
    distance: f64,
}

impl GaussianBands {
    pub fn new(length: usize, distance: f64) -> Self {
        assert!(distance > 0.0, "Band distance must be positive");
        Self {
            mid: GaussianMa::new(length),
            atr: Atr::new(length),
            distance,
        }
    }

    /// Calculate one band per candle with full history, newest last.
    pub fn calculate(&self, bars: &[Bar]) -> Vec<Band> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mids = self.mid.calculate(&closes);
        let atrs = self.atr.calculate_bars(bars);

        // Both series end on the newest candle; align on the shorter tail.
        let n = mids.len().min(atrs.len());
        let mids = &mids[mids.len() - n..];
        let atrs = &atrs[atrs.len() - n..];

        mids.iter()
            .zip(atrs)
            .map(|(&mid, &atr)| Band {
                mid,
                upper: mid + self.distance * atr,
                lower: mid - self.distance * atr,
            })
            .collect()
    }
}
