//! Dynamic exits for open positions.

use tracing::{debug, error, info, warn};
use trading_core::error::TradingError;
use trading_core::types::{closed_bars, Band, BrokerPosition, PriceLadder, Timeframe};
use trading_risk::{ladder_advance, trail_stop, ExitConfig};

use crate::context::EngineContext;

/// Levels moved during one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExitReport {
    pub stops_moved: Vec<u64>,
    pub targets_moved: Vec<u64>,
    /// Positions that hit an error
    pub failures: Vec<u64>,
}

/// Trails stops along the volatility band and take-profits up the ladder.
pub struct ExitController {
    ctx: EngineContext,
    config: ExitConfig,
    timeframe: Timeframe,
    candle_count: usize,
    daily_candle_count: usize,
}

/// Market inputs shared by every position in one pass.
struct ExitInputs {
    band: Option<Band>,
    ladder: Option<PriceLadder>,
}

impl ExitController {
    pub fn new(
        ctx: EngineContext,
        config: ExitConfig,
        timeframe: Timeframe,
        candle_count: usize,
        daily_candle_count: usize,
    ) -> Self {
        Self {
            ctx,
            config,
            timeframe,
            candle_count,
            daily_candle_count,
        }
    }

    /// Evaluate every managed position once.
    ///
    /// Errors are contained per position so one bad ticket never blocks the
    /// rest.
    pub async fn run(&self, positions: &[BrokerPosition]) -> ExitReport {
        let mut report = ExitReport::default();
        if positions.is_empty() || !(self.config.trail_stop_loss || self.config.trail_take_profit) {
            return report;
        }

        let inputs = self.inputs().await;
        for position in positions {
            if let Err(e) = self.manage(position, &inputs, &mut report).await {
                error!(ticket = position.ticket, error = %e, "Exit management failed");
                self.ctx
                    .notifier
                    .send_alert(&format!(
                        "⚠️ <b>Exit management failed</b>\nTicket: {}\nError: {}",
                        position.ticket, e
                    ))
                    .await;
                report.failures.push(position.ticket);
            }
        }
        report
    }

    async fn inputs(&self) -> ExitInputs {
        let band = if self.config.trail_stop_loss {
            self.latest_band().await
        } else {
            None
        };
        let ladder = if self.config.trail_take_profit {
            self.ctx
                .price_ladder(self.config.ladder_basis, self.daily_candle_count)
                .await
        } else {
            None
        };
        ExitInputs { band, ladder }
    }

    /// Band of the newest closed candle.
    async fn latest_band(&self) -> Option<Band> {
        let candles = match self.ctx.broker.candles(self.timeframe, self.candle_count).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!(error = %e, "Failed to fetch candles for trailing stop");
                return None;
            }
        };
        let band = self
            .ctx
            .indicators
            .volatility_band(closed_bars(&candles), self.config.band_length, self.config.band_distance)
            .last()
            .copied();
        if band.is_none() {
            warn!(candles = candles.len(), "Volatility band unavailable");
        }
        band
    }

    async fn manage(
        &self,
        position: &BrokerPosition,
        inputs: &ExitInputs,
        report: &mut ExitReport,
    ) -> Result<(), TradingError> {
        let ticket = position.ticket;
        let direction = position.direction;
        let price = self.ctx.broker.current_price(direction.opposite()).await?;
        let mut stop_loss = position.sl;
        let mut failure: Option<TradingError> = None;

        // Only a candidate on the protective side of the exit price can be
        // placed by the venue.
        let stop_candidate = inputs
            .band
            .map(|band| band.stop_for(direction))
            .filter(|&candidate| direction.is_beyond(price, candidate))
            .and_then(|candidate| trail_stop(direction, position.sl, candidate));

        if let Some(new_stop) = stop_candidate {
            match self
                .ctx
                .broker
                .modify_position(ticket, Some(new_stop), position.tp)
                .await
            {
                Ok(()) => {
                    info!(ticket, old = ?position.sl, new = new_stop, "Trailing stop advanced");
                    self.ctx.store.update(ticket, |r| r.sl_level = Some(new_stop))?;
                    stop_loss = Some(new_stop);
                    report.stops_moved.push(ticket);
                    self.ctx
                        .notifier
                        .send_alert(&format!(
                            "⚙️ <b>Trailing Stop Update</b>\nTicket: {ticket}\nNew SL: {new_stop:.2}"
                        ))
                        .await;
                }
                Err(e) => failure = Some(e.into()),
            }
        }

        let next_target = inputs.ladder.as_ref().and_then(|ladder| {
            ladder_advance(direction, &ladder.side(direction).rungs, position.tp, price)
        });

        if let Some(target) = next_target {
            match self
                .ctx
                .broker
                .modify_position(ticket, stop_loss, Some(target))
                .await
            {
                Ok(()) => {
                    info!(ticket, old = ?position.tp, new = target, price, "Take-profit advanced");
                    self.ctx.store.update(ticket, |r| r.tp_level = Some(target))?;
                    report.targets_moved.push(ticket);
                    self.ctx
                        .notifier
                        .send_alert(&format!(
                            "🎯 <b>Take Profit Update</b>\nTicket: {ticket}\nNew TP: {target:.2}"
                        ))
                        .await;
                }
                Err(e) => failure = Some(e.into()),
            }
        } else {
            debug!(ticket, price, tp = ?position.tp, "Take-profit unchanged");
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
