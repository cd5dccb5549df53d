//! End-to-end scenarios against the simulated venue.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{daily_candles, flat_candles, manual_position, now, Bot, MAGIC};
use rust_decimal_macros::dec;
use tempfile::TempDir;
use trading_broker::{BrokerCall, SimulatedBroker};
use trading_core::types::{Bar, DealReason, Direction, EntryType, Signal, Timeframe};
use trading_engine::{EntryAction, ReconcileConfig};
use trading_monitor::{CsvReportSink, MemoryReportSink};
use trading_risk::ExitConfig;

fn fast_reconcile(attempts: u32) -> ReconcileConfig {
    ReconcileConfig {
        deal_retry_attempts: attempts,
        deal_retry_delay_ms: 1,
        ..ReconcileConfig::default()
    }
}

fn next_bar(bars: &[Bar], close: f64, high: f64, low: f64) -> Bar {
    let last = bars.last().copied().unwrap();
    Bar::new(last.timestamp + 300_000, close, high, low, close, 1.0)
}

#[tokio::test]
async fn closure_is_reported_once_after_deal_history_catches_up() {
    let report_dir = TempDir::new().unwrap();
    let reports = Arc::new(CsvReportSink::open(report_dir.path()).unwrap());
    let broker = SimulatedBroker::new("XAUUSD", Timeframe::Minute5)
        .with_contract_size(dec!(100))
        .with_deal_index_lag(4);
    let bot = Bot::new(broker, reports.clone());
    bot.broker.set_candles(Timeframe::Minute5, flat_candles(40, 2000.0));
    bot.broker.set_candles(Timeframe::Daily, daily_candles(1990.0));
    bot.indicators.force_signal(Signal::Buy);

    let mut control = bot.control_loop(ExitConfig::default(), fast_reconcile(5), Duration::ZERO);
    let opened = control.tick(now()).await.unwrap();
    let Some(EntryAction::Opened { ticket, .. }) = opened.entry else {
        panic!("expected an entry, got {:?}", opened.entry);
    };

    bot.broker.set_price(2010.0);
    bot.broker.close_externally(ticket, DealReason::Client).unwrap();
    bot.broker.clear_journal();

    let outcome = control.tick(now()).await.unwrap();
    assert_eq!(outcome.reconcile.closed, vec![ticket]);

    let deal_queries = bot
        .broker
        .journal()
        .iter()
        .filter(|e| e.call == BrokerCall::Deals { ticket })
        .count();
    assert_eq!(deal_queries, 5);

    let history = reports.trade_history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].ticket, ticket);
    // (2010 - 2000) * 0.10 lots * 100 units
    assert_eq!(history[0].profit, dec!(100.00));
    assert_eq!(history[0].exit_reason, "Manual Close");
    assert!(bot.ctx.store.get(ticket).unwrap().is_none());
    assert_eq!(bot.notifier.count_containing("WIN"), 1);

    // Nothing left to finalize.
    let again = control.tick(now()).await.unwrap();
    assert!(again.reconcile.closed.is_empty());
    assert_eq!(reports.trade_history().unwrap().len(), 1);
}

#[tokio::test]
async fn reversal_closes_before_opening_after_the_delay() {
    let bot = Bot::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5), Arc::new(MemoryReportSink::new()));
    let candles = flat_candles(40, 2000.0);
    bot.broker.set_candles(Timeframe::Minute5, candles.clone());
    bot.broker.set_candles(Timeframe::Daily, daily_candles(1990.0));
    bot.indicators.force_signal(Signal::Buy);

    let delay = Duration::from_millis(50);
    let mut control = bot.control_loop(ExitConfig::default(), fast_reconcile(1), delay);
    let Some(EntryAction::Opened { ticket: long, .. }) = control.tick(now()).await.unwrap().entry else {
        panic!("expected a long entry");
    };

    bot.broker.clear_journal();
    bot.indicators.force_signal(Signal::Sell);
    bot.broker.push_bar(next_bar(&candles, 2000.0, 2000.5, 1999.5));

    let outcome = control.tick(now()).await.unwrap();
    let Some(EntryAction::Reversed { closed, ticket: short }) = outcome.entry else {
        panic!("expected a reversal, got {:?}", outcome.entry);
    };
    assert_eq!(closed, vec![long]);

    let journal = bot.broker.journal();
    let close_at = journal
        .iter()
        .position(|e| e.call == BrokerCall::Close { ticket: long })
        .unwrap();
    let open_at = journal
        .iter()
        .position(|e| {
            e.call
                == BrokerCall::Open {
                    direction: Direction::Short,
                    magic: MAGIC,
                }
        })
        .unwrap();
    assert!(close_at < open_at);
    assert!(journal[open_at].at.duration_since(journal[close_at].at) >= delay);

    let record = bot.ctx.store.get(short).unwrap().unwrap();
    assert_eq!(record.entry_type, EntryType::Reversal);
    assert_eq!(record.direction, Direction::Short);
}

#[tokio::test]
async fn manual_trade_is_adopted_onto_the_ladder() {
    let bot = Bot::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5), Arc::new(MemoryReportSink::new()));
    bot.broker.set_candles(Timeframe::Minute5, flat_candles(40, 2000.0));
    bot.broker.set_candles(Timeframe::Daily, daily_candles(2000.0));
    bot.broker.insert_position(manual_position(555, Direction::Long, 1996.0, Some(2030.0)));

    let first_rung = (2000.0_f64.sqrt() + 0.125).powi(2);
    let mut control = bot.control_loop(ExitConfig::default(), fast_reconcile(1), Duration::ZERO);

    let outcome = control.tick(now()).await.unwrap();
    assert_eq!(outcome.reconcile.adopted, vec![555]);
    assert_eq!(bot.broker.position(555).unwrap().tp, Some(first_rung));

    let record = bot.ctx.store.get(555).unwrap().unwrap();
    assert_eq!(record.entry_type, EntryType::AdoptedManual);
    assert_eq!(record.entry_type.to_string(), "Adopted/Manual");
    assert_eq!(record.tp_level, Some(first_rung));

    control.tick(now()).await.unwrap();
    assert_eq!(bot.notifier.count_containing("Manual Trade Adopted"), 1);
}

#[tokio::test]
async fn take_profit_hit_on_a_replayed_bar_is_reported() {
    let reports = Arc::new(MemoryReportSink::new());
    let bot = Bot::new(SimulatedBroker::new("XAUUSD", Timeframe::Minute5), reports.clone());
    let candles = flat_candles(40, 2000.0);
    bot.broker.set_candles(Timeframe::Minute5, candles.clone());
    bot.broker.set_candles(Timeframe::Daily, daily_candles(1990.0));
    bot.indicators.force_signal(Signal::Buy);

    let mut control = bot.control_loop(ExitConfig::default(), fast_reconcile(1), Duration::ZERO);
    let Some(EntryAction::Opened { ticket, .. }) = control.tick(now()).await.unwrap().entry else {
        panic!("expected an entry");
    };
    let tp = bot.broker.position(ticket).unwrap().tp.unwrap();

    bot.indicators.force_signal(Signal::Hold);
    bot.broker.push_bar(next_bar(&candles, tp + 0.5, tp + 1.0, 1999.5));
    assert!(bot.broker.position(ticket).is_none());

    let outcome = control.tick(now()).await.unwrap();
    assert_eq!(outcome.reconcile.closed, vec![ticket]);
    let trades = reports.trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].exit_reason, "Take Profit");
    assert_eq!(trades[0].take_profit, Some(tp));
    assert!(trades[0].is_win());
}
