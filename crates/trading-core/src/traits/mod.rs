//! Collaborator traits for the trading bot.

mod broker;
mod indicator;
mod notifier;
mod report;

pub use broker::Broker;
pub use indicator::{Indicator, IndicatorLibrary};
pub use notifier::Notifier;
pub use report::ReportSink;
