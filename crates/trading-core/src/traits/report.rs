//! Trade history sink.

use std::collections::HashSet;

use crate::error::ReportError;
use crate::types::{EntryDecision, TradeRecord};

/// Durable destination for closed trades and the activity log.
pub trait ReportSink: Send + Sync {
    /// Append one closed trade.
    fn append_trade_record(&self, record: &TradeRecord) -> Result<(), ReportError>;

    /// Append the levels chosen for an entry attempt.
    fn append_entry_decision(&self, decision: &EntryDecision) -> Result<(), ReportError>;

    /// Append one activity line.
    fn append_activity(&self, level: &str, message: &str) -> Result<(), ReportError>;

    /// Tickets already present in the trade history.
    ///
    /// Used after a restart so a closure is never logged twice.
    fn logged_tickets(&self) -> Result<HashSet<u64>, ReportError>;
}
