//! In-process simulated venue.
//!
//! Holds positions, deals and candles behind one lock and fills market
//! orders at the current quote. Used for paper replays and as the broker
//! double in tests, so it can also lag deal indexing, reject requests and
//! journal every call it receives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;
use trading_core::error::BrokerError;
use trading_core::traits::Broker;
use trading_core::types::{
    Bar, BrokerPosition, Deal, DealEntry, DealReason, Direction, OrderOutcome, OrderRequest,
    OwnerFilter, Timeframe,
};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// A call received by the simulated venue.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    OpenPositions(OwnerFilter),
    Candles(Timeframe),
    CurrentPrice(Direction),
    Open { direction: Direction, magic: u64 },
    Modify { ticket: u64, stop_loss: Option<f64>, take_profit: Option<f64> },
    Close { ticket: u64 },
    Deals { ticket: u64 },
}

/// A journaled call with the instant it arrived.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub at: Instant,
    pub call: BrokerCall,
}

#[derive(Debug, Default)]
struct SimState {
    positions: BTreeMap<u64, BrokerPosition>,
    deals: Vec<Deal>,
    candles: HashMap<Timeframe, Vec<Bar>>,
    bid: Option<f64>,
    next_ticket: u64,
    next_deal: u64,
    /// Remaining empty deal queries per closed ticket
    pending_index: HashMap<u64, usize>,
    reject_open: Option<String>,
    reject_modify: Option<String>,
    reject_close: Option<String>,
    journal: Vec<JournalEntry>,
}

impl SimState {
    fn now(&self, base: Timeframe) -> DateTime<Utc> {
        self.candles
            .get(&base)
            .and_then(|bars| bars.last())
            .map(|bar| bar.datetime())
            .unwrap_or_else(Utc::now)
    }

    fn record(&mut self, call: BrokerCall) {
        self.journal.push(JournalEntry {
            at: Instant::now(),
            call,
        });
    }
}

/// Simulated broker for one symbol.
#[derive(Debug)]
pub struct SimulatedBroker {
    symbol: String,
    base_timeframe: Timeframe,
    spread: f64,
    contract_size: Decimal,
    commission_per_lot: Decimal,
    deal_index_lag: usize,
    state: Mutex<SimState>,
}

impl SimulatedBroker {
    /// Create a venue quoting `symbol` on `base_timeframe` candles.
    pub fn new(symbol: impl Into<String>, base_timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            base_timeframe,
            spread: 0.0,
            contract_size: Decimal::ONE,
            commission_per_lot: Decimal::ZERO,
            deal_index_lag: 0,
            state: Mutex::new(SimState {
                next_ticket: 1000,
                next_deal: 1,
                ..SimState::default()
            }),
        }
    }

    /// Set the ask-bid spread in price units.
    pub fn with_spread(mut self, spread: f64) -> Self {
        self.spread = spread;
        self
    }

    /// Set units per lot used for profit.
    pub fn with_contract_size(mut self, contract_size: Decimal) -> Self {
        self.contract_size = contract_size;
        self
    }

    /// Set commission charged per lot on each side.
    pub fn with_commission(mut self, commission_per_lot: Decimal) -> Self {
        self.commission_per_lot = commission_per_lot;
        self
    }

    /// Make the deal history of a closed position come back empty this many
    /// times before it is indexed.
    pub fn with_deal_index_lag(mut self, queries: usize) -> Self {
        self.deal_index_lag = queries;
        self
    }

    /// Issue tickets from `ticket` upwards.
    pub fn with_first_ticket(mut self, ticket: u64) -> Self {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner).next_ticket = ticket;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the candle history of a timeframe.
    pub fn set_candles(&self, timeframe: Timeframe, bars: Vec<Bar>) {
        let mut state = self.lock();
        if timeframe == self.base_timeframe {
            state.bid = bars.last().map(|b| b.close);
        }
        state.candles.insert(timeframe, bars);
    }

    /// Set the bid directly.
    pub fn set_price(&self, bid: f64) {
        self.lock().bid = Some(bid);
    }

    /// Append a base-timeframe candle, fold it into the daily series and
    /// settle any stop or target it touched.
    pub fn push_bar(&self, bar: Bar) {
        let mut state = self.lock();
        state.candles.entry(self.base_timeframe).or_default().push(bar);

        if self.base_timeframe != Timeframe::Daily {
            let daily = state.candles.entry(Timeframe::Daily).or_default();
            let day_start = bar.timestamp - bar.timestamp.rem_euclid(MILLIS_PER_DAY);
            match daily.last_mut() {
                Some(today) if today.timestamp == day_start => {
                    today.high = today.high.max(bar.high);
                    today.low = today.low.min(bar.low);
                    today.close = bar.close;
                    today.volume += bar.volume;
                }
                _ => daily.push(Bar::new(day_start, bar.open, bar.high, bar.low, bar.close, bar.volume)),
            }
        }

        state.bid = Some(bar.close);
        self.settle_levels(&mut state, &bar);
    }

    fn settle_levels(&self, state: &mut SimState, bar: &Bar) {
        let hits: Vec<(u64, f64, DealReason)> = state
            .positions
            .values()
            .filter_map(|p| {
                let (stop_hit, target_hit) = match p.direction {
                    Direction::Long => (
                        p.sl.filter(|&sl| bar.low <= sl),
                        p.tp.filter(|&tp| bar.high >= tp),
                    ),
                    Direction::Short => (
                        p.sl.filter(|&sl| bar.high + self.spread >= sl),
                        p.tp.filter(|&tp| bar.low + self.spread <= tp),
                    ),
                };
                // Assume the worse outcome when a candle spans both levels.
                stop_hit
                    .map(|sl| (p.ticket, sl, DealReason::StopLoss))
                    .or_else(|| target_hit.map(|tp| (p.ticket, tp, DealReason::TakeProfit)))
            })
            .collect();

        for (ticket, price, reason) in hits {
            debug!(ticket, price, %reason, "Simulated level hit");
            self.settle(state, ticket, price, reason);
        }
    }

    /// Close `ticket` at `price`, booking the exit deal.
    fn settle(&self, state: &mut SimState, ticket: u64, price: f64, reason: DealReason) {
        let Some(position) = state.positions.remove(&ticket) else {
            return;
        };
        let time = state.now(self.base_timeframe);
        let diff = (price - position.price_open) * position.direction.sign();
        let gross = Decimal::try_from(diff).unwrap_or(Decimal::ZERO) * position.volume * self.contract_size;

        let id = state.next_deal;
        state.next_deal += 1;
        state.deals.push(Deal {
            id,
            position_ticket: ticket,
            direction: position.direction.opposite(),
            entry: DealEntry::Out,
            volume: position.volume,
            price,
            profit: gross.round_dp(2),
            commission: -self.commission_per_lot * position.volume,
            swap: Decimal::ZERO,
            time,
            reason,
        });
        if self.deal_index_lag > 0 {
            state.pending_index.insert(ticket, self.deal_index_lag);
        }
    }

    fn book_entry(&self, state: &mut SimState, position: &BrokerPosition, reason: DealReason) {
        let id = state.next_deal;
        state.next_deal += 1;
        state.deals.push(Deal {
            id,
            position_ticket: position.ticket,
            direction: position.direction,
            entry: DealEntry::In,
            volume: position.volume,
            price: position.price_open,
            profit: Decimal::ZERO,
            commission: -self.commission_per_lot * position.volume,
            swap: Decimal::ZERO,
            time: position.opened_at,
            reason,
        });
    }

    /// Place a position as if it had been opened outside the bot.
    pub fn insert_position(&self, position: BrokerPosition) {
        let mut state = self.lock();
        state.next_ticket = state.next_ticket.max(position.ticket + 1);
        self.book_entry(&mut state, &position, DealReason::Client);
        state.positions.insert(position.ticket, position);
    }

    /// Close a position from outside the bot at the current quote.
    pub fn close_externally(&self, ticket: u64, reason: DealReason) -> Result<(), BrokerError> {
        let mut state = self.lock();
        let direction = state
            .positions
            .get(&ticket)
            .map(|p| p.direction)
            .ok_or(BrokerError::PositionNotFound(ticket))?;
        let price = self.exit_quote(&state, direction)?;
        self.settle(&mut state, ticket, price, reason);
        Ok(())
    }

    /// Reject subsequent opens with `reason`, or accept them again with `None`.
    pub fn reject_opens(&self, reason: Option<&str>) {
        self.lock().reject_open = reason.map(str::to_string);
    }

    pub fn reject_modifies(&self, reason: Option<&str>) {
        self.lock().reject_modify = reason.map(str::to_string);
    }

    pub fn reject_closes(&self, reason: Option<&str>) {
        self.lock().reject_close = reason.map(str::to_string);
    }

    /// Snapshot of every open position.
    pub fn positions(&self) -> Vec<BrokerPosition> {
        self.lock().positions.values().cloned().collect()
    }

    pub fn position(&self, ticket: u64) -> Option<BrokerPosition> {
        self.lock().positions.get(&ticket).cloned()
    }

    /// Every deal booked so far, indexed or not.
    pub fn deals(&self) -> Vec<Deal> {
        self.lock().deals.clone()
    }

    /// Calls received so far, oldest first.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    fn entry_quote(&self, state: &SimState, direction: Direction) -> Result<f64, BrokerError> {
        let bid = state
            .bid
            .ok_or_else(|| BrokerError::PriceUnavailable(self.symbol.clone()))?;
        Ok(match direction {
            Direction::Long => bid + self.spread,
            Direction::Short => bid,
        })
    }

    fn exit_quote(&self, state: &SimState, direction: Direction) -> Result<f64, BrokerError> {
        self.entry_quote(state, direction.opposite())
    }

    fn check_levels(
        direction: Direction,
        reference: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<(), String> {
        if let Some(sl) = stop_loss {
            if !direction.is_beyond(reference, sl) {
                return Err(format!("Invalid stops: stop loss {sl} against price {reference}"));
            }
        }
        if let Some(tp) = take_profit {
            if !direction.is_beyond(tp, reference) {
                return Err(format!("Invalid stops: take profit {tp} against price {reference}"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Broker for SimulatedBroker {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn open_positions(&self, filter: OwnerFilter) -> Result<Vec<BrokerPosition>, BrokerError> {
        let mut state = self.lock();
        state.record(BrokerCall::OpenPositions(filter));
        Ok(state
            .positions
            .values()
            .filter(|p| p.symbol == self.symbol && filter.matches(p.magic))
            .cloned()
            .collect())
    }

    async fn candles(&self, timeframe: Timeframe, count: usize) -> Result<Vec<Bar>, BrokerError> {
        let mut state = self.lock();
        state.record(BrokerCall::Candles(timeframe));
        let bars = state.candles.get(&timeframe).map(Vec::as_slice).unwrap_or_default();
        let start = bars.len().saturating_sub(count);
        Ok(bars[start..].to_vec())
    }

    async fn current_price(&self, direction: Direction) -> Result<f64, BrokerError> {
        let mut state = self.lock();
        state.record(BrokerCall::CurrentPrice(direction));
        self.entry_quote(&state, direction)
    }

    async fn open_position(&self, request: OrderRequest) -> Result<OrderOutcome, BrokerError> {
        let mut state = self.lock();
        state.record(BrokerCall::Open {
            direction: request.direction,
            magic: request.magic,
        });

        if let Some(reason) = state.reject_open.clone() {
            return Err(BrokerError::OrderRejected(reason));
        }
        if request.symbol != self.symbol {
            return Err(BrokerError::OrderRejected(format!("Unknown symbol {}", request.symbol)));
        }
        if request.volume <= Decimal::ZERO {
            return Err(BrokerError::OrderRejected("Invalid volume".to_string()));
        }

        let price = self.entry_quote(&state, request.direction)?;
        Self::check_levels(request.direction, price, request.stop_loss, request.take_profit)
            .map_err(BrokerError::OrderRejected)?;

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let position = BrokerPosition {
            ticket,
            symbol: request.symbol.clone(),
            direction: request.direction,
            volume: request.volume,
            price_open: price,
            sl: request.stop_loss,
            tp: request.take_profit,
            magic: request.magic,
            opened_at: state.now(self.base_timeframe),
        };
        let reason = if request.magic == 0 { DealReason::Client } else { DealReason::Expert };
        self.book_entry(&mut state, &position, reason);
        state.positions.insert(ticket, position);

        debug!(ticket, direction = %request.direction, price, "Simulated fill");
        Ok(OrderOutcome {
            ticket,
            price,
            volume: request.volume,
        })
    }

    async fn modify_position(
        &self,
        ticket: u64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<(), BrokerError> {
        let mut state = self.lock();
        state.record(BrokerCall::Modify {
            ticket,
            stop_loss,
            take_profit,
        });

        if let Some(reason) = state.reject_modify.clone() {
            return Err(BrokerError::ModifyRejected { ticket, reason });
        }
        let direction = state
            .positions
            .get(&ticket)
            .map(|p| p.direction)
            .ok_or(BrokerError::PositionNotFound(ticket))?;
        let reference = self.exit_quote(&state, direction)?;
        Self::check_levels(direction, reference, stop_loss, take_profit)
            .map_err(|reason| BrokerError::ModifyRejected { ticket, reason })?;

        if let Some(position) = state.positions.get_mut(&ticket) {
            position.sl = stop_loss;
            position.tp = take_profit;
        }
        Ok(())
    }

    async fn close_position(&self, ticket: u64) -> Result<(), BrokerError> {
        let mut state = self.lock();
        state.record(BrokerCall::Close { ticket });

        if let Some(reason) = state.reject_close.clone() {
            return Err(BrokerError::CloseRejected { ticket, reason });
        }
        let position = state
            .positions
            .get(&ticket)
            .cloned()
            .ok_or(BrokerError::PositionNotFound(ticket))?;
        let price = self.exit_quote(&state, position.direction)?;
        let reason = if position.is_manual() { DealReason::Client } else { DealReason::Expert };
        self.settle(&mut state, ticket, price, reason);
        Ok(())
    }

    async fn deals_for_position(&self, ticket: u64) -> Result<Vec<Deal>, BrokerError> {
        let mut state = self.lock();
        state.record(BrokerCall::Deals { ticket });

        if let Some(remaining) = state.pending_index.get_mut(&ticket) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(vec![]);
            }
            state.pending_index.remove(&ticket);
        }

        Ok(state
            .deals
            .iter()
            .filter(|d| d.position_ticket == ticket)
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "Simulated"
    }
}
