//! Core data types for the trading bot.

mod ohlcv;
mod order;
mod position;
mod signal;
mod timeframe;
mod trade;

pub use ohlcv::{closed_bars, closes, Bar};
pub use order::{Direction, FillPolicy, OrderOutcome, OrderRequest};
pub use position::{
    BrokerPosition, Deal, DealEntry, DealReason, OwnerFilter, Settlement, MANUAL_MAGIC,
};
pub use signal::{Band, LadderBasis, LadderSide, PriceLadder, Signal};
pub use timeframe::Timeframe;
pub use trade::{EntryDecision, EntryType, ManagedTradeRecord, TradeRecord};
