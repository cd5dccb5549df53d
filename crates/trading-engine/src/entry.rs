//! Signal-driven entries and reversals.
//!
//! The position state is read from the bot's own open positions on every
//! evaluation: flat, long or short. Adopted manual positions never take part.

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use trading_core::error::TradingError;
use trading_core::types::{
    Bar, BrokerPosition, Direction, EntryDecision, EntryType, FillPolicy, ManagedTradeRecord, OrderRequest, OwnerFilter,
    Signal, Timeframe,
};
use trading_risk::{ExitConfig, LevelInputs, StopLossPolicy, TakeProfitPolicy};

use crate::context::EngineContext;

/// Order parameters for new positions.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub lot_size: Decimal,
    pub magic: u64,
    pub fill_policy: FillPolicy,
    /// Maximum slippage in points
    pub deviation: u32,
    pub trend_length: usize,
    /// Candles fetched per evaluation
    pub candle_count: usize,
    /// Daily candles fetched for the price ladder
    pub daily_candle_count: usize,
    /// Pause between closing and reopening on a reversal
    pub reversal_delay: Duration,
}

/// What an evaluation did.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryAction {
    /// Hold signal, or already positioned with the signal
    None,
    Opened { ticket: u64, direction: Direction },
    Reversed { closed: Vec<u64>, ticket: u64 },
    /// The venue refused the order; nothing was stored
    Rejected(String),
    /// Levels could not be computed this candle
    Skipped(String),
    /// A close failed, so the opposite side was not opened
    ReversalAborted,
}

/// Opens, and reverses, bot positions on trend signals.
pub struct EntryController {
    ctx: EngineContext,
    config: EntryConfig,
    exits: ExitConfig,
}

impl EntryController {
    pub fn new(ctx: EngineContext, config: EntryConfig, exits: ExitConfig) -> Self {
        Self { ctx, config, exits }
    }

    /// Act on the signal of the newest closed candle.
    ///
    /// `closed` must hold closed candles only, oldest first.
    pub async fn evaluate(&self, closed: &[Bar]) -> Result<EntryAction, TradingError> {
        let signal = self
            .ctx
            .indicators
            .trend_signal(closed, self.config.trend_length)
            .last()
            .copied()
            .unwrap_or(Signal::Hold);
        let Some(direction) = signal.direction() else {
            debug!("Hold signal");
            return Ok(EntryAction::None);
        };

        let owned = self
            .ctx
            .broker
            .open_positions(OwnerFilter::Owned(self.config.magic))
            .await?;
        let opposing: Vec<&BrokerPosition> = owned.iter().filter(|p| p.direction != direction).collect();

        if owned.is_empty() {
            info!(%direction, "Entry signal while flat");
            return self.open(direction, closed, None).await;
        }
        if opposing.is_empty() {
            debug!(%direction, positions = owned.len(), "Already positioned with the signal");
            return Ok(EntryAction::None);
        }

        info!(%direction, positions = owned.len(), "Reversal signal");
        self.reverse(direction, &owned, closed).await
    }

    async fn reverse(
        &self,
        direction: Direction,
        owned: &[BrokerPosition],
        closed: &[Bar],
    ) -> Result<EntryAction, TradingError> {
        let mut closed_tickets = Vec::with_capacity(owned.len());
        for position in owned {
            match self.ctx.broker.close_position(position.ticket).await {
                Ok(()) => {
                    info!(ticket = position.ticket, "Closed for reversal");
                    closed_tickets.push(position.ticket);
                }
                Err(e) => {
                    error!(ticket = position.ticket, error = %e, "Reversal close failed; not opening");
                    self.ctx
                        .notifier
                        .send_alert(&format!(
                            "⚠️ <b>Reversal aborted</b>\nTicket: {}\nError: {}",
                            position.ticket, e
                        ))
                        .await;
                    return Ok(EntryAction::ReversalAborted);
                }
            }
        }

        if !self.config.reversal_delay.is_zero() {
            tokio::time::sleep(self.config.reversal_delay).await;
        }

        match self.open(direction, closed, Some(EntryType::Reversal)).await? {
            EntryAction::Opened { ticket, .. } => Ok(EntryAction::Reversed {
                closed: closed_tickets,
                ticket,
            }),
            other => Ok(other),
        }
    }

    async fn open(
        &self,
        direction: Direction,
        closed: &[Bar],
        entry_type: Option<EntryType>,
    ) -> Result<EntryAction, TradingError> {
        let price = self.ctx.broker.current_price(direction).await?;

        let atr = self
            .ctx
            .indicators
            .average_true_range(closed, self.exits.atr_period)
            .last()
            .copied();
        let band = if self.exits.initial_stop == StopLossPolicy::Band {
            self.ctx
                .indicators
                .volatility_band(closed, self.exits.band_length, self.exits.band_distance)
                .last()
                .copied()
        } else {
            None
        };
        let ladder = if self.exits.initial_target == TakeProfitPolicy::Ladder {
            self.ctx
                .price_ladder(self.exits.ladder_basis, self.config.daily_candle_count)
                .await
        } else {
            None
        };

        let inputs = LevelInputs {
            atr,
            band,
            ladder: ladder.as_ref(),
        };
        let levels = match self.exits.initial_levels(direction, price, &inputs) {
            Ok(levels) => levels,
            Err(e) => {
                warn!(%direction, price, error = %e, "Cannot compute initial levels; skipping entry");
                return Ok(EntryAction::Skipped(e.to_string()));
            }
        };
        let entry_type = entry_type.unwrap_or(levels.entry_type);

        let decision = EntryDecision {
            timestamp: Utc::now(),
            symbol: self.config.symbol.clone(),
            direction,
            price,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit,
            entry_type,
            atr,
            zone: levels.zone.map(|z| z.to_string()),
        };
        if let Err(e) = self.ctx.reports.append_entry_decision(&decision) {
            warn!(error = %e, "Failed to record entry decision");
        }

        let request = OrderRequest::market(&self.config.symbol, direction, self.config.lot_size, price)
            .with_levels(levels.stop_loss, levels.take_profit)
            .with_magic(self.config.magic)
            .with_execution(self.config.fill_policy, self.config.deviation)
            .with_comment(entry_type.to_string());

        let outcome = match self.ctx.broker.open_position(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%direction, price, error = %e, "Order rejected");
                self.ctx
                    .notifier
                    .send_alert(&format!(
                        "❌ <b>Order failed</b>\nSymbol: {}\nDirection: {}\nError: {}",
                        self.config.symbol, direction, e
                    ))
                    .await;
                return Ok(EntryAction::Rejected(e.to_string()));
            }
        };

        let record = ManagedTradeRecord::opened(
            outcome.ticket,
            self.config.symbol.as_str(),
            direction,
            outcome.price,
            entry_type,
        )
        .with_levels(levels.stop_loss, levels.take_profit);
        self.ctx.store.save(outcome.ticket, record)?;

        info!(
            ticket = outcome.ticket,
            %direction,
            price = outcome.price,
            sl = ?levels.stop_loss,
            tp = ?levels.take_profit,
            %entry_type,
            "Position opened"
        );
        let fmt_level = |level: Option<f64>| level.map_or_else(|| "none".to_string(), |l| format!("{l:.2}"));
        self.ctx
            .notifier
            .send_alert(&format!(
                "🚀 <b>Trade Opened</b>\nTicket: {}\nSymbol: {}\nDirection: {}\nEntry: {:.2}\nSL: {}\nTP: {}\nType: {}",
                outcome.ticket,
                self.config.symbol,
                direction,
                outcome.price,
                fmt_level(levels.stop_loss),
                fmt_level(levels.take_profit),
                entry_type
            ))
            .await;

        Ok(EntryAction::Opened {
            ticket: outcome.ticket,
            direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candles, Harness};
    use rust_decimal_macros::dec;
    use trading_broker::SimulatedBroker;
    use trading_core::types::closed_bars;

    fn entry_config() -> EntryConfig {
        EntryConfig {
            symbol: "XAUUSD".to_string(),
            timeframe: Timeframe::Minute5,
            lot_size: dec!(0.10),
            magic: Harness::MAGIC,
            fill_policy: FillPolicy::Fok,
            deviation: 20,
            trend_length: 10,
            candle_count: 100,
            daily_candle_count: 5,
            reversal_delay: Duration::ZERO,
        }
    }

    fn harness() -> (Harness, Vec<Bar>) {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        let bars = candles(40, 2000.0);
        h.broker.set_candles(Timeframe::Minute5, bars.clone());
        h.seed_daily(1990.0);
        let closed = closed_bars(&bars).to_vec();
        (h, closed)
    }

    #[tokio::test]
    async fn test_flat_buy_opens_and_records() {
        let (h, closed) = harness();
        h.indicators.set_signal(Signal::Buy);
        let entry = EntryController::new(h.ctx.clone(), entry_config(), ExitConfig::default());

        let action = entry.evaluate(&closed).await.unwrap();
        let EntryAction::Opened { ticket, direction } = action else {
            panic!("expected an open, got {action:?}");
        };
        assert_eq!(direction, Direction::Long);

        let position = h.broker.position(ticket).unwrap();
        assert_eq!(position.magic, Harness::MAGIC);
        assert!(position.sl.unwrap() < position.price_open);
        assert!(position.tp.unwrap() > position.price_open);

        let record = h.ctx.store.get(ticket).unwrap().unwrap();
        assert_eq!(record.tp_level, position.tp);
        assert_eq!(record.sl_level, position.sl);
        assert_eq!(h.notifier.count_containing("Trade Opened"), 1);

        let decisions = h.reports.entry_decisions();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].direction, Direction::Long);
        assert_eq!(decisions[0].stop_loss, position.sl);
        assert_eq!(decisions[0].take_profit, position.tp);
        assert!(decisions[0].atr.is_some());

        // Same signal again is a no-op.
        assert_eq!(entry.evaluate(&closed).await.unwrap(), EntryAction::None);
    }

    #[tokio::test]
    async fn test_rejection_stores_nothing() {
        let (h, closed) = harness();
        h.indicators.set_signal(Signal::Sell);
        h.broker.reject_opens(Some("No money"));
        let entry = EntryController::new(h.ctx.clone(), entry_config(), ExitConfig::default());

        let action = entry.evaluate(&closed).await.unwrap();
        assert!(matches!(action, EntryAction::Rejected(_)));
        assert!(h.ctx.store.list_tickets().unwrap().is_empty());
        assert_eq!(h.notifier.count_containing("Order failed"), 1);
        // The attempt is still on record.
        assert_eq!(h.reports.entry_decisions().len(), 1);
    }

    #[tokio::test]
    async fn test_reversal_aborted_when_close_fails() {
        let (h, closed) = harness();
        let ticket = h.open_owned(Direction::Long).await;
        h.indicators.set_signal(Signal::Sell);
        h.broker.reject_closes(Some("Requote"));
        let entry = EntryController::new(h.ctx.clone(), entry_config(), ExitConfig::default());

        let action = entry.evaluate(&closed).await.unwrap();
        assert_eq!(action, EntryAction::ReversalAborted);
        assert!(h.broker.position(ticket).is_some());
        assert_eq!(h.broker.positions().len(), 1);
        assert_eq!(h.notifier.count_containing("Reversal aborted"), 1);
    }

    #[tokio::test]
    async fn test_reversal_tags_new_position() {
        let (h, closed) = harness();
        let old = h.open_owned(Direction::Long).await;
        h.indicators.set_signal(Signal::Sell);
        let entry = EntryController::new(h.ctx.clone(), entry_config(), ExitConfig::default());

        let action = entry.evaluate(&closed).await.unwrap();
        let EntryAction::Reversed { closed: closed_tickets, ticket } = action else {
            panic!("expected a reversal, got {action:?}");
        };
        assert_eq!(closed_tickets, vec![old]);
        assert_eq!(h.broker.position(ticket).unwrap().direction, Direction::Short);
        assert_eq!(
            h.ctx.store.get(ticket).unwrap().unwrap().entry_type,
            EntryType::Reversal
        );
    }

    #[tokio::test]
    async fn test_missing_atr_skips_entry() {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        let bars = candles(5, 2000.0);
        h.broker.set_candles(Timeframe::Minute5, bars.clone());
        h.indicators.set_signal(Signal::Buy);
        let exits = ExitConfig {
            initial_target: TakeProfitPolicy::Atr,
            ..ExitConfig::default()
        };
        let entry = EntryController::new(h.ctx.clone(), entry_config(), exits);

        let action = entry.evaluate(closed_bars(&bars)).await.unwrap();
        assert!(matches!(action, EntryAction::Skipped(_)));
        assert!(h.broker.positions().is_empty());
        assert!(h.reports.entry_decisions().is_empty());
    }
}
