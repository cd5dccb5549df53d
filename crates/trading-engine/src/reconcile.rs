//! Reconciliation of persisted state with the broker.
//!
//! Each pass:
//! 1. fetches owned and manual open positions,
//! 2. adopts manual positions not yet tracked,
//! 3. re-registers owned positions whose record is missing,
//! 4. finalizes tracked tickets that are no longer open.
//!
//! A ticket leaves the store only after its closing deal has been read and
//! reported. Until then it is retried on every pass.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use trading_core::error::TradingError;
use trading_core::types::{
    BrokerPosition, EntryType, ManagedTradeRecord, OwnerFilter, PriceLadder, Settlement,
    Timeframe, TradeRecord,
};
use trading_risk::ExitConfig;

use crate::context::EngineContext;

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Take over manual positions
    pub adopt_manual: bool,
    /// Deal history queries per closed ticket per pass
    pub deal_retry_attempts: u32,
    /// Pause between deal history queries
    pub deal_retry_delay_ms: u64,
    /// Daily candles fetched for the price ladder
    pub daily_candle_count: usize,
    /// Take-profit distance under which a position already sits on the rung
    pub tp_tolerance: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            adopt_manual: true,
            deal_retry_attempts: 5,
            deal_retry_delay_ms: 1000,
            daily_candle_count: 5,
            tp_tolerance: 0.01,
        }
    }
}

impl ReconcileConfig {
    pub fn deal_retry_delay(&self) -> Duration {
        Duration::from_millis(self.deal_retry_delay_ms)
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        if self.deal_retry_attempts == 0 {
            return Err(TradingError::Config(
                "reconcile: deal_retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.daily_candle_count < 2 {
            return Err(TradingError::Config(
                "reconcile: daily_candle_count must be at least 2".to_string(),
            ));
        }
        if self.tp_tolerance < 0.0 {
            return Err(TradingError::Config(
                "reconcile: tp_tolerance cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// What one pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub adopted: Vec<u64>,
    pub recovered: Vec<u64>,
    /// Tickets finalized and removed from the store
    pub closed: Vec<u64>,
    /// Closed tickets whose deals are not available yet
    pub pending: Vec<u64>,
}

/// Keeps the state store consistent with the broker.
pub struct ReconciliationEngine {
    ctx: EngineContext,
    config: ReconcileConfig,
    exits: ExitConfig,
    magic: u64,
    timeframe: Timeframe,
}

impl ReconciliationEngine {
    pub fn new(
        ctx: EngineContext,
        config: ReconcileConfig,
        exits: ExitConfig,
        magic: u64,
        timeframe: Timeframe,
    ) -> Self {
        Self {
            ctx,
            config,
            exits,
            magic,
            timeframe,
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Fails without touching the store when the open positions cannot be
    /// listed, so a broker outage never reads as a mass closure.
    pub async fn run(&self) -> Result<ReconcileReport, TradingError> {
        let owned = self
            .ctx
            .broker
            .open_positions(OwnerFilter::Owned(self.magic))
            .await?;
        let manual = self.ctx.broker.open_positions(OwnerFilter::Manual).await?;

        let mut report = ReconcileReport::default();
        if self.config.adopt_manual {
            self.adopt(&manual, &mut report).await?;
        }
        self.recover(&owned, &mut report)?;
        self.detect_closures(&owned, &manual, &mut report).await?;

        if report != ReconcileReport::default() {
            info!(
                adopted = report.adopted.len(),
                recovered = report.recovered.len(),
                closed = report.closed.len(),
                pending = report.pending.len(),
                "Reconciliation pass"
            );
        }
        Ok(report)
    }

    async fn adopt(&self, manual: &[BrokerPosition], report: &mut ReconcileReport) -> Result<(), TradingError> {
        let tracked = self.ctx.store.list_tickets()?;
        let untracked: Vec<&BrokerPosition> = manual.iter().filter(|p| !tracked.contains(&p.ticket)).collect();
        if untracked.is_empty() {
            return Ok(());
        }

        let ladder = self
            .ctx
            .price_ladder(self.exits.ladder_basis, self.config.daily_candle_count)
            .await;

        for position in untracked {
            match self.adopt_one(position, ladder.as_ref()).await {
                Ok(()) => report.adopted.push(position.ticket),
                Err(e) => {
                    error!(ticket = position.ticket, error = %e, "Failed to adopt manual trade");
                    self.ctx
                        .notifier
                        .send_alert(&format!(
                            "⚠️ <b>Adoption failed</b>\nTicket: {}\nError: {}",
                            position.ticket, e
                        ))
                        .await;
                }
            }
        }
        Ok(())
    }

    async fn adopt_one(&self, position: &BrokerPosition, ladder: Option<&PriceLadder>) -> Result<(), TradingError> {
        let ticket = position.ticket;
        let mut take_profit = position.tp;

        if let Some(target) = ladder.and_then(|l| l.rung(position.direction, self.exits.initial_rung)) {
            let on_rung = position
                .tp
                .is_some_and(|tp| (tp - target).abs() <= self.config.tp_tolerance);
            if !on_rung {
                match self
                    .ctx
                    .broker
                    .modify_position(ticket, position.sl, Some(target))
                    .await
                {
                    Ok(()) => {
                        info!(ticket, target, "Adopted trade moved to ladder target");
                        take_profit = Some(target);
                    }
                    Err(e) => warn!(ticket, target, error = %e, "Could not set ladder target on adopted trade"),
                }
            }
        }

        let record = ManagedTradeRecord::from_position(position, EntryType::AdoptedManual)
            .with_levels(position.sl, take_profit);
        self.ctx.store.save(ticket, record)?;
        info!(ticket, direction = %position.direction, "Adopted manual trade");

        let tp_text = take_profit.map_or_else(|| "none".to_string(), |tp| format!("{tp:.2}"));
        self.ctx
            .notifier
            .send_alert(&format!(
                "🤝 <b>Manual Trade Adopted</b>\nTicket: {}\nSymbol: {}\nDirection: {}\nEntry: {:.2}\nTP: {}",
                ticket, position.symbol, position.direction, position.price_open, tp_text
            ))
            .await;
        Ok(())
    }

    /// Track owned positions that have no record, e.g. after the state file
    /// was quarantined.
    fn recover(&self, owned: &[BrokerPosition], report: &mut ReconcileReport) -> Result<(), TradingError> {
        let tracked = self.ctx.store.list_tickets()?;
        for position in owned.iter().filter(|p| !tracked.contains(&p.ticket)) {
            let record = ManagedTradeRecord::from_position(position, EntryType::Recovered);
            self.ctx.store.save(position.ticket, record)?;
            warn!(ticket = position.ticket, "Owned position had no state record; re-registered it");
            report.recovered.push(position.ticket);
        }
        Ok(())
    }

    async fn detect_closures(
        &self,
        owned: &[BrokerPosition],
        manual: &[BrokerPosition],
        report: &mut ReconcileReport,
    ) -> Result<(), TradingError> {
        let open: HashSet<u64> = owned.iter().chain(manual).map(|p| p.ticket).collect();
        let closed: BTreeSet<u64> = self
            .ctx
            .store
            .list_tickets()?
            .into_iter()
            .filter(|t| !open.contains(t))
            .collect();
        if closed.is_empty() {
            return Ok(());
        }

        let logged = match self.ctx.reports.logged_tickets() {
            Ok(logged) => logged,
            Err(e) => {
                warn!(error = %e, "Could not read logged tickets");
                HashSet::new()
            }
        };

        for ticket in closed {
            match self.finalize(ticket, &logged).await {
                Ok(true) => report.closed.push(ticket),
                Ok(false) => report.pending.push(ticket),
                Err(e) => {
                    error!(ticket, error = %e, "Failed to finalize closed trade");
                    self.ctx
                        .notifier
                        .send_alert(&format!(
                            "⚠️ <b>Closed trade not finalized</b>\nTicket: {ticket}\nError: {e}"
                        ))
                        .await;
                    report.pending.push(ticket);
                }
            }
        }
        Ok(())
    }

    /// Report and forget one closed ticket. Returns `false` when its deals
    /// are not available yet.
    async fn finalize(&self, ticket: u64, logged: &HashSet<u64>) -> Result<bool, TradingError> {
        let Some(record) = self.ctx.store.get(ticket)? else {
            return Ok(true);
        };
        let Some(settlement) = self.settlement(ticket).await else {
            warn!(
                ticket,
                attempts = self.config.deal_retry_attempts,
                "Closing deal not indexed yet; will retry next pass"
            );
            return Ok(false);
        };

        if logged.contains(&ticket) {
            info!(ticket, "Closed trade already in history");
        } else {
            let trade = self.trade_record(&record, &settlement);
            self.ctx.reports.append_trade_record(&trade)?;
            info!(ticket, profit = %trade.profit, reason = %trade.exit_reason, "Trade closed");
            self.ctx.notifier.send_alert(&closure_message(&trade)).await;
        }

        self.ctx.store.remove(ticket)?;
        Ok(true)
    }

    /// Query deal history with bounded retries.
    async fn settlement(&self, ticket: u64) -> Option<Settlement> {
        let attempts = self.config.deal_retry_attempts.max(1);
        for attempt in 1..=attempts {
            match self.ctx.broker.deals_for_position(ticket).await {
                Ok(deals) => match Settlement::from_deals(&deals) {
                    Some(settlement) => return Some(settlement),
                    None => debug!(ticket, attempt, "No closing deal yet"),
                },
                Err(e) => warn!(ticket, attempt, error = %e, "Deal history query failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.deal_retry_delay()).await;
            }
        }
        None
    }

    fn trade_record(&self, record: &ManagedTradeRecord, settlement: &Settlement) -> TradeRecord {
        TradeRecord {
            ticket: record.ticket,
            entry_time: settlement.entry_time.unwrap_or(record.opened_at),
            exit_time: settlement.exit_time,
            symbol: record.symbol.clone(),
            timeframe: self.timeframe.to_string(),
            direction: record.direction,
            volume: settlement.volume,
            entry_price: settlement.entry_price.unwrap_or(record.entry_price),
            exit_price: settlement.exit_price,
            take_profit: record.tp_level,
            stop_loss: record.sl_level,
            profit: settlement.profit,
            entry_type: record.entry_type,
            exit_reason: settlement.exit_reason.to_string(),
        }
    }
}

fn closure_message(trade: &TradeRecord) -> String {
    let headline = if trade.is_win() {
        "✅ <b>Trade Closed: WIN</b>"
    } else {
        "❌ <b>Trade Closed: LOSS</b>"
    };
    format!(
        "{}\nTicket: {}\nSymbol: {}\nDirection: {}\nEntry: {:.2}\nExit: {:.2}\nProfit: ${}\nReason: {}",
        headline,
        trade.ticket,
        trade.symbol,
        trade.direction,
        trade.entry_price,
        trade.exit_price,
        trade.profit.round_dp(2),
        trade.exit_reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{manual_position, Harness};
    use rust_decimal_macros::dec;
    use trading_broker::SimulatedBroker;
    use trading_core::types::{DealReason, Direction, Timeframe};

    fn engine(h: &Harness, config: ReconcileConfig) -> ReconciliationEngine {
        ReconciliationEngine::new(h.ctx.clone(), config, ExitConfig::default(), Harness::MAGIC, Timeframe::Minute5)
    }

    fn fast() -> ReconcileConfig {
        ReconcileConfig {
            deal_retry_delay_ms: 1,
            ..ReconcileConfig::default()
        }
    }

    #[tokio::test]
    async fn test_adoption_is_recorded_once_even_when_modify_fails() {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        h.seed_daily(2000.0);
        h.broker.set_price(2000.0);
        h.broker.insert_position(manual_position(77, Direction::Long, 1995.0, None));
        h.broker.reject_modifies(Some("Trade disabled"));

        let engine = engine(&h, fast());
        let first = engine.run().await.unwrap();
        let second = engine.run().await.unwrap();

        assert_eq!(first.adopted, vec![77]);
        assert!(second.adopted.is_empty());
        let record = h.ctx.store.get(77).unwrap().unwrap();
        assert_eq!(record.entry_type, EntryType::AdoptedManual);
        assert_eq!(record.tp_level, None);
        assert_eq!(h.notifier.count_containing("Adopted"), 1);
    }

    #[tokio::test]
    async fn test_adoption_disabled() {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        h.broker.set_price(2000.0);
        h.broker.insert_position(manual_position(5, Direction::Long, 1995.0, None));

        let config = ReconcileConfig {
            adopt_manual: false,
            ..fast()
        };
        let report = engine(&h, config).run().await.unwrap();
        assert!(report.adopted.is_empty());
        assert!(h.ctx.store.list_tickets().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lost_record_is_recovered() {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        h.broker.set_price(2000.0);
        let ticket = h.open_owned(Direction::Short).await;
        h.ctx.store.remove(ticket).unwrap();

        let report = engine(&h, fast()).run().await.unwrap();
        assert_eq!(report.recovered, vec![ticket]);
        let record = h.ctx.store.get(ticket).unwrap().unwrap();
        assert_eq!(record.entry_type, EntryType::Recovered);
    }

    #[tokio::test]
    async fn test_pending_closure_keeps_ticket() {
        let broker = SimulatedBroker::new("XAUUSD", Timeframe::Minute5)
            .with_contract_size(dec!(100))
            .with_deal_index_lag(10);
        let h = Harness::new(broker);
        h.broker.set_price(2000.0);
        let ticket = h.open_owned(Direction::Long).await;
        h.broker.close_externally(ticket, DealReason::StopLoss).unwrap();

        let config = ReconcileConfig {
            deal_retry_attempts: 3,
            ..fast()
        };
        let report = engine(&h, config).run().await.unwrap();
        assert_eq!(report.pending, vec![ticket]);
        assert!(h.ctx.store.get(ticket).unwrap().is_some());
        assert!(h.reports.trades().is_empty());
    }

    #[tokio::test]
    async fn test_failed_closure_does_not_block_others() {
        let broker = SimulatedBroker::new("XAUUSD", Timeframe::Minute5).with_contract_size(dec!(100));
        let h = Harness::new(broker);
        h.broker.set_price(2000.0);
        let broken = h.open_owned(Direction::Long).await;
        let healthy = h.open_owned(Direction::Long).await;
        h.broker.set_price(2003.0);
        h.broker.close_externally(broken, DealReason::StopLoss).unwrap();
        h.broker.close_externally(healthy, DealReason::TakeProfit).unwrap();
        h.reports.fail_ticket(broken);

        let engine = engine(&h, fast());
        let report = engine.run().await.unwrap();

        assert_eq!(report.closed, vec![healthy]);
        assert_eq!(report.pending, vec![broken]);
        assert_eq!(h.reports.trades().len(), 1);
        assert_eq!(h.reports.trades()[0].ticket, healthy);
        assert!(h.ctx.store.get(healthy).unwrap().is_none());
        assert!(h.ctx.store.get(broken).unwrap().is_some());
        assert_eq!(h.notifier.count_containing("Closed trade not finalized"), 1);
        assert_eq!(h.notifier.count_containing("Trade Closed"), 1);
    }

    #[tokio::test]
    async fn test_already_logged_ticket_is_only_removed() {
        let h = Harness::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5));
        h.broker.set_price(2000.0);
        let ticket = h.open_owned(Direction::Long).await;
        h.broker.set_price(2004.0);
        h.broker.close_externally(ticket, DealReason::TakeProfit).unwrap();

        let engine = engine(&h, fast());
        engine.run().await.unwrap();
        assert_eq!(h.reports.trades().len(), 1);

        // Simulate a crash between reporting and removal.
        let record = ManagedTradeRecord::opened(ticket, "XAUUSD", Direction::Long, 2000.0, EntryType::Atr);
        h.ctx.store.save(ticket, record).unwrap();
        let report = engine.run().await.unwrap();

        assert_eq!(report.closed, vec![ticket]);
        assert_eq!(h.reports.trades().len(), 1);
        assert_eq!(h.notifier.count_containing("Trade Closed"), 1);
        assert!(h.ctx.store.get(ticket).unwrap().is_none());
    }
}
