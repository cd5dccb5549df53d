//! Fixtures shared by the scenario tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use tempfile::TempDir;
use trading_broker::SimulatedBroker;
use trading_core::traits::{IndicatorLibrary, ReportSink};
use trading_core::types::{
    Band, Bar, BrokerPosition, Direction, FillPolicy, LadderBasis, PriceLadder, Signal, Timeframe,
    MANUAL_MAGIC,
};
use trading_engine::{ControlLoop, EngineContext, EntryConfig, ReconcileConfig, ScheduleConfig};
use trading_indicators::StandardIndicators;
use trading_monitor::RecordingNotifier;
use trading_risk::ExitConfig;
use trading_state::StateStore;

pub const MAGIC: u64 = 234000;
pub const SYMBOL: &str = "XAUUSD";

/// Standard indicators, optionally with a forced trend signal.
#[derive(Default)]
pub struct Indicators {
    forced: Mutex<Option<Signal>>,
}

impl Indicators {
    pub fn force_signal(&self, signal: Signal) {
        *self.forced.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal);
    }
}

impl IndicatorLibrary for Indicators {
    fn trend_signal(&self, candles: &[Bar], length: usize) -> Vec<Signal> {
        match *self.forced.lock().unwrap_or_else(PoisonError::into_inner) {
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

pub struct Bot {
    pub broker: Arc<SimulatedBroker>,
    pub indicators: Arc<Indicators>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: EngineContext,
    pub dir: TempDir,
}

impl Bot {
    pub fn new(broker: SimulatedBroker, reports: Arc<dyn ReportSink>) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("trade_state.json")).unwrap());
        let broker = Arc::new(broker);
        let indicators = Arc::new(Indicators::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = EngineContext::new(broker.clone(), store, indicators.clone(), notifier.clone(), reports);
        Self {
            broker,
            indicators,
            notifier,
            ctx,
            dir,
        }
    }

    pub fn control_loop(&self, exits: ExitConfig, reconcile: ReconcileConfig, reversal_delay: Duration) -> ControlLoop {
        let schedule = ScheduleConfig {
            check_market_hours: false,
            ..ScheduleConfig::default()
        };
        ControlLoop::new(self.ctx.clone(), entry_config(reversal_delay), exits, reconcile, schedule)
    }
}

pub fn entry_config(reversal_delay: Duration) -> EntryConfig {
    EntryConfig {
        symbol: SYMBOL.to_string(),
        timeframe: Timeframe::Minute5,
        lot_size: dec!(0.10),
        magic: MAGIC,
        fill_policy: FillPolicy::Fok,
        deviation: 20,
        trend_length: 10,
        candle_count: 100,
        daily_candle_count: 5,
        reversal_delay,
    }
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
}

/// Flat five-minute candles around `close`, the last one still forming.
pub fn flat_candles(count: usize, close: f64) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap().timestamp_millis();
    (0..count)
        .map(|i| Bar::new(start + i as i64 * 300_000, close, close + 1.0, close - 1.0, close, 1.0))
        .collect()
}

/// Yesterday closing at `previous_close` plus today's forming candle.
pub fn daily_candles(previous_close: f64) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap().timestamp_millis();
    vec![
        Bar::new(start, previous_close - 4.0, previous_close + 6.0, previous_close - 9.0, previous_close, 1.0),
        Bar::new(start + 86_400_000, previous_close, previous_close + 2.0, previous_close - 2.0, previous_close, 1.0),
    ]
}

pub fn manual_position(ticket: u64, direction: Direction, price_open: f64, tp: Option<f64>) -> BrokerPosition {
    BrokerPosition {
        ticket,
        symbol: SYMBOL.to_string(),
        direction,
        volume: dec!(0.10),
        price_open,
        sl: None,
        tp,
        magic: MANUAL_MAGIC,
        opened_at: Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
    }
}
