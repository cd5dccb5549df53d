//! Exit policy configuration and initial protective levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use trading_core::error::{IndicatorError, TradingError};
use trading_core::types::{Band, Direction, EntryType, LadderBasis, PriceLadder};

/// How the initial stop-loss of a new position is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopLossPolicy {
    /// No stop; requires `allow_no_stop_loss`
    None,
    /// ATR multiple from entry, by volatility zone
    #[default]
    Atr,
    /// Favorable boundary of the volatility band
    Band,
}

/// How the initial take-profit of a new position is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitPolicy {
    /// ATR multiple from entry, by volatility zone
    Atr,
    /// Ladder rung, falling back to ATR when no ladder is available
    #[default]
    Ladder,
}

/// Volatility regime of the latest ATR relative to price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolatilityZone {
    Low,
    Mid,
    High,
}

impl fmt::Display for VolatilityZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VolatilityZone::Low => "low",
            VolatilityZone::Mid => "mid",
            VolatilityZone::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// ATR multiples for one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneMultipliers {
    pub sl: f64,
    pub tp: f64,
}

/// ATR zone thresholds (percent of price) and their multiples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtrZones {
    pub low_below_pct: f64,
    pub mid_below_pct: f64,
    pub low: ZoneMultipliers,
    pub mid: ZoneMultipliers,
    pub high: ZoneMultipliers,
}

impl Default for AtrZones {
    fn default() -> Self {
        Self {
            low_below_pct: 0.1,
            mid_below_pct: 0.25,
            low: ZoneMultipliers { sl: 1.0, tp: 2.0 },
            mid: ZoneMultipliers { sl: 1.5, tp: 2.5 },
            high: ZoneMultipliers { sl: 2.0, tp: 3.5 },
        }
    }
}

impl AtrZones {
    /// Classify an ATR reading against the price it was taken at.
    pub fn classify(&self, atr: f64, price: f64) -> VolatilityZone {
        let pct = atr / price * 100.0;
        if pct < self.low_below_pct {
            VolatilityZone::Low
        } else if pct < self.mid_below_pct {
            VolatilityZone::Mid
        } else {
            VolatilityZone::High
        }
    }

    pub fn multipliers(&self, zone: VolatilityZone) -> ZoneMultipliers {
        match zone {
            VolatilityZone::Low => self.low,
            VolatilityZone::Mid => self.mid,
            VolatilityZone::High => self.high,
        }
    }
}

/// Exit behavior shared by entries, adoption and the exit controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub initial_stop: StopLossPolicy,
    pub initial_target: TakeProfitPolicy,
    /// Trail the stop along the volatility band
    pub trail_stop_loss: bool,
    /// Advance the take-profit along the ladder
    pub trail_take_profit: bool,
    /// Permit positions without any stop-loss
    pub allow_no_stop_loss: bool,
    pub atr_period: usize,
    pub atr_zones: AtrZones,
    pub band_length: usize,
    pub band_distance: f64,
    pub ladder_basis: LadderBasis,
    /// Ladder rung used for initial and adopted take-profits, 0 = entry rung
    pub initial_rung: usize,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            initial_stop: StopLossPolicy::Atr,
            initial_target: TakeProfitPolicy::Ladder,
            trail_stop_loss: true,
            trail_take_profit: true,
            allow_no_stop_loss: false,
            atr_period: 14,
            atr_zones: AtrZones::default(),
            band_length: 20,
            band_distance: 1.5,
            ladder_basis: LadderBasis::PreviousDayClose,
            initial_rung: 0,
        }
    }
}

impl ExitConfig {
    /// Reject inconsistent combinations.
    pub fn validate(&self) -> Result<(), TradingError> {
        let fail = |msg: &str| Err(TradingError::Config(format!("exits: {msg}")));

        if self.initial_stop == StopLossPolicy::None && !self.allow_no_stop_loss {
            return fail("initial_stop = \"none\" requires allow_no_stop_loss = true");
        }
        if self.initial_stop == StopLossPolicy::None && self.trail_stop_loss {
            return fail("trail_stop_loss cannot be enabled when initial_stop = \"none\"");
        }
        if self.atr_period == 0 {
            return fail("atr_period must be greater than 0");
        }
        if self.band_length == 0 {
            return fail("band_length must be greater than 0");
        }
        if !self.band_distance.is_finite() || self.band_distance <= 0.0 {
            return fail("band_distance must be positive");
        }

        let zones = &self.atr_zones;
        if zones.low_below_pct <= 0.0 || zones.low_below_pct >= zones.mid_below_pct {
            return fail("atr_zones thresholds must satisfy 0 < low_below_pct < mid_below_pct");
        }
        for m in [zones.low, zones.mid, zones.high] {
            if m.sl <= 0.0 || m.tp <= 0.0 {
                return fail("atr_zones multipliers must be positive");
            }
        }
        Ok(())
    }

    /// Compute stop-loss and take-profit for a new position.
    pub fn initial_levels(
        &self,
        direction: Direction,
        entry_price: f64,
        inputs: &LevelInputs<'_>,
    ) -> Result<InitialLevels, IndicatorError> {
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(IndicatorError::InvalidParameter(format!(
                "entry price must be positive, got {entry_price}"
            )));
        }

        let atr = inputs.atr.filter(|a| a.is_finite() && *a > 0.0);
        let zone = atr.map(|a| self.atr_zones.classify(a, entry_price));
        let atr_levels = atr.zip(zone).map(|(a, z)| {
            let m = self.atr_zones.multipliers(z);
            (
                entry_price - direction.sign() * a * m.sl,
                entry_price + direction.sign() * a * m.tp,
            )
        });
        let missing_atr = || IndicatorError::InsufficientData {
            required: self.atr_period + 1,
            available: 0,
        };

        let stop_loss = match self.initial_stop {
            StopLossPolicy::None => None,
            StopLossPolicy::Atr => Some(atr_levels.ok_or_else(missing_atr)?.0),
            StopLossPolicy::Band => {
                // A band boundary on the wrong side of entry cannot protect
                // the position; fall back to the ATR stop.
                let band_stop = inputs
                    .band
                    .map(|b| b.stop_for(direction))
                    .filter(|&s| direction.is_beyond(entry_price, s));
                match band_stop {
                    Some(stop) => Some(stop),
                    None => Some(atr_levels.ok_or_else(missing_atr)?.0),
                }
            }
        };

        let ladder_target = match self.initial_target {
            TakeProfitPolicy::Ladder => inputs
                .ladder
                .and_then(|l| first_rung_beyond(l, direction, self.initial_rung, entry_price)),
            TakeProfitPolicy::Atr => None,
        };
        let (take_profit, entry_type) = match ladder_target {
            Some(tp) => (tp, EntryType::Ladder),
            None => (atr_levels.ok_or_else(missing_atr)?.1, EntryType::Atr),
        };

        debug!(
            %direction,
            entry_price,
            ?zone,
            ?stop_loss,
            take_profit,
            "Initial levels computed"
        );

        Ok(InitialLevels {
            stop_loss,
            take_profit: Some(take_profit),
            zone,
            entry_type,
        })
    }
}

/// First rung at or after `start` that lies beyond `price`.
fn first_rung_beyond(ladder: &PriceLadder, direction: Direction, start: usize, price: f64) -> Option<f64> {
    let rungs = &ladder.side(direction).rungs;
    let start = start.min(rungs.len().saturating_sub(1));
    rungs
        .iter()
        .skip(start)
        .copied()
        .find(|&r| direction.is_beyond(r, price))
}

/// Indicator readings available when a position is opened.
#[derive(Debug, Clone, Default)]
pub struct LevelInputs<'a> {
    /// Latest ATR of closed candles
    pub atr: Option<f64>,
    /// Latest band of closed candles
    pub band: Option<Band>,
    pub ladder: Option<&'a PriceLadder>,
}

/// Protective levels for a new position.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialLevels {
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub zone: Option<VolatilityZone>,
    /// `Ladder` when the target came from the ladder, `Atr` otherwise
    pub entry_type: EntryType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use trading_core::types::LadderSide;

    fn ladder() -> PriceLadder {
        PriceLadder {
            reference: 2000.0,
            buy: LadderSide { rungs: vec![2005.0, 2010.0, 2020.0], stop_loss: 1997.0 },
            sell: LadderSide { rungs: vec![1995.0, 1990.0, 1980.0], stop_loss: 2003.0 },
        }
    }

    #[test]
    fn test_zone_classification() {
        let zones = AtrZones::default();
        assert_eq!(zones.classify(1.0, 2000.0), VolatilityZone::Low); // 0.05%
        assert_eq!(zones.classify(3.0, 2000.0), VolatilityZone::Mid); // 0.15%
        assert_eq!(zones.classify(6.0, 2000.0), VolatilityZone::High); // 0.3%
    }

    #[test]
    fn test_atr_levels_by_zone() {
        let config = ExitConfig {
            initial_target: TakeProfitPolicy::Atr,
            ..ExitConfig::default()
        };
        let inputs = LevelInputs { atr: Some(3.0), ..LevelInputs::default() };

        let long = config.initial_levels(Direction::Long, 2000.0, &inputs).unwrap();
        assert_eq!(long.zone, Some(VolatilityZone::Mid));
        assert_eq!(long.stop_loss, Some(1995.5));
        assert_eq!(long.take_profit, Some(2007.5));
        assert_eq!(long.entry_type, EntryType::Atr);

        let short = config.initial_levels(Direction::Short, 2000.0, &inputs).unwrap();
        assert_eq!(short.stop_loss, Some(2004.5));
        assert_eq!(short.take_profit, Some(1992.5));
    }

    #[test]
    fn test_ladder_target_skips_rungs_behind_price() {
        let config = ExitConfig::default();
        let ladder = ladder();
        let inputs = LevelInputs { atr: Some(3.0), band: None, ladder: Some(&ladder) };

        let levels = config.initial_levels(Direction::Long, 2007.0, &inputs).unwrap();
        assert_eq!(levels.take_profit, Some(2010.0));
        assert_eq!(levels.entry_type, EntryType::Ladder);

        // Price beyond the whole ladder falls back to ATR.
        let levels = config.initial_levels(Direction::Long, 2030.0, &inputs).unwrap();
        assert_eq!(levels.entry_type, EntryType::Atr);
    }

    #[test]
    fn test_band_stop_falls_back_when_unprotective() {
        let config = ExitConfig {
            initial_stop: StopLossPolicy::Band,
            initial_target: TakeProfitPolicy::Atr,
            ..ExitConfig::default()
        };
        let band = Band { mid: 2000.0, upper: 2004.0, lower: 1996.0 };
        let inputs = LevelInputs { atr: Some(3.0), band: Some(band), ladder: None };

        let levels = config.initial_levels(Direction::Long, 2000.0, &inputs).unwrap();
        assert_eq!(levels.stop_loss, Some(1996.0));

        // Lower band above entry cannot protect a long.
        let levels = config.initial_levels(Direction::Long, 1995.0, &inputs).unwrap();
        assert_eq!(levels.stop_loss, Some(1995.0 - 4.5));
    }

    #[test]
    fn test_missing_atr_is_an_error() {
        let config = ExitConfig::default();
        let result = config.initial_levels(Direction::Long, 2000.0, &LevelInputs::default());
        assert!(matches!(result, Err(IndicatorError::InsufficientData { .. })));
    }

    #[test]
    fn test_no_stop_requires_flag() {
        let mut config = ExitConfig {
            initial_stop: StopLossPolicy::None,
            trail_stop_loss: false,
            ..ExitConfig::default()
        };
        assert!(config.validate().is_err());

        config.allow_no_stop_loss = true;
        assert!(config.validate().is_ok());

        config.trail_stop_loss = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_zones() {
        let mut config = ExitConfig::default();
        assert!(config.validate().is_ok());
        config.atr_zones.mid_below_pct = 0.05;
        assert!(config.validate().is_err());
    }
}
