//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use tempfile::TempDir;
use trading_broker::SimulatedBroker;
use trading_core::traits::{Broker, IndicatorLibrary};
use trading_core::types::{
    Band, Bar, BrokerPosition, Direction, EntryType, LadderBasis, ManagedTradeRecord, OrderRequest,
    PriceLadder, Signal, Timeframe, MANUAL_MAGIC,
};
use trading_indicators::StandardIndicators;
use trading_monitor::{MemoryReportSink, RecordingNotifier};
use trading_state::StateStore;

use crate::context::EngineContext;

/// Standard indicators with a trend signal set by the test.
#[derive(Default)]
pub(crate) struct ScriptedIndicators {
    signal: Mutex<Option<Signal>>,
}

impl ScriptedIndicators {
    pub fn set_signal(&self, signal: Signal) {
        *self.signal.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal);
    }
}

impl IndicatorLibrary for ScriptedIndicators {
    fn trend_signal(&self, candles: &[Bar], length: usize) -> Vec<Signal> {
        match *self.signal.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(signal) => vec![signal; candles.len()],
            None => StandardIndicators.trend_signal(candles, length),
        }
    }

    fn volatility_band(&self, candles: &[Bar], length: usize, distance: f64) -> Vec<Band> {
        StandardIndicators.volatility_band(candles, length, distance)
    }

    fn price_ladder(&self, daily: &[Bar], basis: LadderBasis) -> Option<PriceLadder> {
        StandardIndicators.price_ladder(daily, basis)
    }

    fn average_true_range(&self, candles: &[Bar], period: usize) -> Vec<f64> {
        StandardIndicators.average_true_range(candles, period)
    }
}

pub(crate) struct Harness {
    pub broker: Arc<SimulatedBroker>,
    pub indicators: Arc<ScriptedIndicators>,
    pub notifier: Arc<RecordingNotifier>,
    pub reports: Arc<MemoryReportSink>,
    pub ctx: EngineContext,
    _dir: TempDir,
}

impl Harness {
    pub const MAGIC: u64 = 234000;

    pub fn new(broker: SimulatedBroker) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("trade_state.json")).unwrap());
        let broker = Arc::new(broker);
        let notifier = Arc::new(RecordingNotifier::new());
        let reports = Arc::new(MemoryReportSink::new());
        let indicators = Arc::new(ScriptedIndicators::default());
        let ctx = EngineContext::new(
            broker.clone(),
            store,
            indicators.clone(),
            notifier.clone(),
            reports.clone(),
        );
        Self {
            broker,
            indicators,
            notifier,
            reports,
            ctx,
            _dir: dir,
        }
    }

    /// Yesterday closing at `previous_close` plus today's forming candle.
    pub fn seed_daily(&self, previous_close: f64) {
        let day = 86_400_000;
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap().timestamp_millis();
        self.broker.set_candles(
            Timeframe::Daily,
            vec![
                Bar::new(start, previous_close - 4.0, previous_close + 6.0, previous_close - 9.0, previous_close, 1.0),
                Bar::new(start + day, previous_close, previous_close + 2.0, previous_close - 2.0, previous_close, 1.0),
            ],
        );
    }

    /// Open a bot position and track it the way an entry would.
    pub async fn open_owned(&self, direction: Direction) -> u64 {
        let request = OrderRequest::market("XAUUSD", direction, dec!(0.10), 0.0).with_magic(Self::MAGIC);
        let outcome = self.broker.open_position(request).await.unwrap();
        let record = ManagedTradeRecord::opened(outcome.ticket, "XAUUSD", direction, outcome.price, EntryType::Atr);
        self.ctx.store.save(outcome.ticket, record).unwrap();
        outcome.ticket
    }
}

pub(crate) fn manual_position(ticket: u64, direction: Direction, price_open: f64, tp: Option<f64>) -> BrokerPosition {
    BrokerPosition {
        ticket,
        symbol: "XAUUSD".to_string(),
        direction,
        volume: dec!(0.10),
        price_open,
        sl: None,
        tp,
        magic: MANUAL_MAGIC,
        opened_at: Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
    }
}

/// Gently rising five-minute candles ending at `last_close`, the last one
/// still forming.
pub(crate) fn candles(count: usize, last_close: f64) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap().timestamp_millis();
    (0..count)
        .map(|i| {
            let close = last_close - (count - 1 - i) as f64 * 0.2;
            Bar::new(start + i as i64 * 300_000, close - 0.1, close + 1.0, close - 1.0, close, 1.0)
        })
        .collect()
}
