//! Broker trait definition.

use crate::error::BrokerError;
use crate::types::{Bar, BrokerPosition, Deal, Direction, OrderOutcome, OrderRequest, OwnerFilter, Timeframe};
use async_trait::async_trait;

/// Trait for the trading venue the bot runs against.
///
/// Every call is awaited in sequence by the control loop. Implementations
/// should return narrow value types only; nothing here is cached by callers
/// beyond a single tick.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Symbol this adapter trades.
    fn symbol(&self) -> &str;

    /// Get open positions on the symbol that pass `filter`.
    async fn open_positions(&self, filter: OwnerFilter) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// Fetch the most recent `count` candles, oldest first.
    ///
    /// The last candle is the one still forming.
    async fn candles(&self, timeframe: Timeframe, count: usize) -> Result<Vec<Bar>, BrokerError>;

    /// Current quote for opening in `direction` (ask for long, bid for short).
    ///
    /// A venue without a quote yields `BrokerError::PriceUnavailable`.
    async fn current_price(&self, direction: Direction) -> Result<f64, BrokerError>;

    /// Submit a market order.
    ///
    /// # Returns
    /// The ticket and fill of the new position, or `BrokerError::OrderRejected`
    async fn open_position(&self, request: OrderRequest) -> Result<OrderOutcome, BrokerError>;

    /// Replace the protective levels of an open position.
    async fn modify_position(
        &self,
        ticket: u64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<(), BrokerError>;

    /// Close an open position at market.
    async fn close_position(&self, ticket: u64) -> Result<(), BrokerError>;

    /// Deal history of a position.
    ///
    /// May legitimately be empty for a short while after the position closed.
    async fn deals_for_position(&self, ticket: u64) -> Result<Vec<Deal>, BrokerError>;

    /// Get the broker name.
    fn name(&self) -> &str;
}
