//! Shared collaborators of the controllers.

use std::sync::Arc;

use tracing::warn;
use trading_core::error::TradingError;
use trading_core::traits::{Broker, IndicatorLibrary, Notifier, ReportSink};
use trading_core::types::{BrokerPosition, LadderBasis, OwnerFilter, PriceLadder, Timeframe};
use trading_state::StateStore;

/// Everything a controller talks to, built once by the process entry point.
#[derive(Clone)]
pub struct EngineContext {
    pub broker: Arc<dyn Broker>,
    pub store: Arc<StateStore>,
    pub indicators: Arc<dyn IndicatorLibrary>,
    pub notifier: Arc<dyn Notifier>,
    pub reports: Arc<dyn ReportSink>,
}

impl EngineContext {
    pub fn new(
        broker: Arc<dyn Broker>,
        store: Arc<StateStore>,
        indicators: Arc<dyn IndicatorLibrary>,
        notifier: Arc<dyn Notifier>,
        reports: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            broker,
            store,
            indicators,
            notifier,
            reports,
        }
    }

    /// Open positions under management: everything stamped with `magic` plus
    /// manual positions that have been adopted.
    pub async fn managed_positions(&self, magic: u64) -> Result<Vec<BrokerPosition>, TradingError> {
        let mut positions = self.broker.open_positions(OwnerFilter::Owned(magic)).await?;
        let tracked = self.store.list_tickets()?;
        let adopted = self
            .broker
            .open_positions(OwnerFilter::Manual)
            .await?
            .into_iter()
            .filter(|p| tracked.contains(&p.ticket));
        positions.extend(adopted);
        Ok(positions)
    }

    /// Today's price ladder, or `None` when it cannot be built right now.
    pub async fn price_ladder(&self, basis: LadderBasis, daily_count: usize) -> Option<PriceLadder> {
        match self.broker.candles(Timeframe::Daily, daily_count).await {
            Ok(daily) => {
                let ladder = self.indicators.price_ladder(&daily, basis);
                if ladder.is_none() {
                    warn!(?basis, days = daily.len(), "Price ladder unavailable");
                }
                ladder
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch daily candles for price ladder");
                None
            }
        }
    }
}
