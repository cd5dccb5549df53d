//! The control loop.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};
use trading_core::error::TradingError;
use trading_core::types::{closed_bars, Timeframe};
use trading_risk::ExitConfig;

use crate::context::EngineContext;
use crate::entry::{EntryAction, EntryConfig, EntryController};
use crate::exits::{ExitController, ExitReport};
use crate::reconcile::{ReconcileConfig, ReconcileReport, ReconciliationEngine};
use crate::schedule::ScheduleConfig;

/// Result of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub reconcile: ReconcileReport,
    pub exits: ExitReport,
    /// False when the iteration stopped at the trading-hours check
    pub market_open: bool,
    /// Set when a new closed candle was evaluated
    pub entry: Option<EntryAction>,
}

/// Runs reconciliation, exits and entries in a fixed order, one tick at a
/// time.
pub struct ControlLoop {
    ctx: EngineContext,
    reconciler: ReconciliationEngine,
    exits: ExitController,
    entry: EntryController,
    schedule: ScheduleConfig,
    magic: u64,
    timeframe: Timeframe,
    candle_count: usize,
    /// Open time of the newest closed candle already evaluated
    last_candle: Option<i64>,
}

impl ControlLoop {
    pub fn new(
        ctx: EngineContext,
        entry: EntryConfig,
        exits: ExitConfig,
        reconcile: ReconcileConfig,
        schedule: ScheduleConfig,
    ) -> Self {
        let reconciler = ReconciliationEngine::new(
            ctx.clone(),
            reconcile,
            exits.clone(),
            entry.magic,
            entry.timeframe,
        );
        let exit_controller = ExitController::new(
            ctx.clone(),
            exits.clone(),
            entry.timeframe,
            entry.candle_count,
            entry.daily_candle_count,
        );
        Self {
            magic: entry.magic,
            timeframe: entry.timeframe,
            candle_count: entry.candle_count,
            entry: EntryController::new(ctx.clone(), entry, exits),
            exits: exit_controller,
            reconciler,
            schedule,
            ctx,
            last_candle: None,
        }
    }

    /// Run one iteration as of `now`.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, TradingError> {
        let reconcile = self.reconciler.run().await;
        self.alert_quarantined().await;
        let reconcile = reconcile?;

        let managed = self.ctx.managed_positions(self.magic).await?;
        let exits = self.exits.run(&managed).await;

        let mut outcome = TickOutcome {
            reconcile,
            exits,
            market_open: self.schedule.is_trading_time(now),
            entry: None,
        };
        if !outcome.market_open {
            debug!(%now, "Outside trading hours");
            return Ok(outcome);
        }

        let candles = self.ctx.broker.candles(self.timeframe, self.candle_count).await?;
        let closed = closed_bars(&candles);
        let Some(newest) = closed.last() else {
            debug!("No closed candles yet");
            return Ok(outcome);
        };
        if self.last_candle.is_some_and(|seen| newest.timestamp <= seen) {
            return Ok(outcome);
        }

        let action = self.entry.evaluate(closed).await?;
        if action != EntryAction::None {
            info!(candle = %newest.datetime(), ?action, "Entry evaluated");
        }
        self.last_candle = Some(newest.timestamp);
        outcome.entry = Some(action);
        Ok(outcome)
    }

    /// Alert on every state backup made since the last tick.
    async fn alert_quarantined(&self) {
        for backup in self.ctx.store.take_quarantined() {
            self.ctx
                .notifier
                .send_alert(&format!(
                    "🚨 <b>CRITICAL</b>\nState file was corrupt and has been archived to {}. \
                     Managed trades are being rebuilt from the broker.",
                    backup.display()
                ))
                .await;
        }
    }

    /// Tick until `shutdown` turns true or its sender goes away.
    ///
    /// The shutdown signal also cuts any pending sleep short.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            broker = self.ctx.broker.name(),
            symbol = self.ctx.broker.symbol(),
            timeframe = %self.timeframe,
            magic = self.magic,
            "Control loop started"
        );

        while !*shutdown.borrow() {
            let pause = match self.tick(Utc::now()).await {
                Ok(outcome) if outcome.market_open => self.schedule.poll_interval(),
                Ok(_) => self.schedule.closed_market_sleep(),
                Err(e) => {
                    error!(severity = "critical", error = %e, "Control loop iteration failed");
                    self.ctx
                        .notifier
                        .send_alert(&format!("🚨 <b>CRITICAL</b>\nControl loop error: {e}"))
                        .await;
                    self.schedule.error_cooldown()
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Control loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candles, Harness};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use trading_broker::SimulatedBroker;
    use trading_core::types::{Bar, Direction, FillPolicy, Signal};

    fn control(h: &Harness, schedule: ScheduleConfig) -> ControlLoop {
        let entry = EntryConfig {
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
        };
        let reconcile = ReconcileConfig {
            deal_retry_delay_ms: 1,
            ..ReconcileConfig::default()
        };
        ControlLoop::new(h.ctx.clone(), entry, ExitConfig::default(), reconcile, schedule)
    }

    fn tuesday_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_entry_runs_once_per_closed_candle() {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        h.broker.set_candles(Timeframe::Minute5, candles(40, 2000.0));
        h.seed_daily(1990.0);
        h.indicators.set_signal(Signal::Hold);
        let mut control = control(&h, ScheduleConfig::default());

        let first = control.tick(tuesday_noon()).await.unwrap();
        assert_eq!(first.entry, Some(EntryAction::None));

        let second = control.tick(tuesday_noon()).await.unwrap();
        assert_eq!(second.entry, None);

        let last = candles(40, 2000.0).last().copied().unwrap();
        h.broker.push_bar(Bar::new(last.timestamp + 300_000, 2000.0, 2001.0, 1999.0, 2000.5, 1.0));
        let third = control.tick(tuesday_noon()).await.unwrap();
        assert!(third.entry.is_some());
    }

    #[tokio::test]
    async fn test_closed_market_skips_entry() {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        h.broker.set_candles(Timeframe::Minute5, candles(40, 2000.0));
        h.indicators.set_signal(Signal::Buy);
        let mut control = control(&h, ScheduleConfig::default());

        let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let outcome = control.tick(saturday).await.unwrap();
        assert!(!outcome.market_open);
        assert_eq!(outcome.entry, None);
        assert!(h.broker.positions().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_alerted_and_rebuilt() {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        h.broker.set_candles(Timeframe::Minute5, candles(40, 2000.0));
        h.broker.set_price(2000.0);
        h.indicators.set_signal(Signal::Hold);
        let ticket = h.open_owned(Direction::Long).await;
        std::fs::write(h.ctx.store.path(), b"{\"1000\": trunc").unwrap();
        let mut control = control(&h, ScheduleConfig::default());

        let outcome = control.tick(tuesday_noon()).await.unwrap();
        assert_eq!(outcome.reconcile.recovered, vec![ticket]);
        assert_eq!(h.notifier.count_containing("State file was corrupt"), 1);

        control.tick(tuesday_noon()).await.unwrap();
        assert_eq!(h.notifier.count_containing("State file was corrupt"), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        h.broker.set_candles(Timeframe::Minute5, candles(40, 2000.0));
        h.indicators.set_signal(Signal::Hold);
        let schedule = ScheduleConfig {
            poll_interval_secs: 3600,
            check_market_hours: false,
            ..ScheduleConfig::default()
        };
        let mut control = control(&h, schedule);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { control.run(rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
