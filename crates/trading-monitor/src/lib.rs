//! Logging, alerts and trade reports.

mod logging;
mod notifier;
mod report;

pub use logging::{setup_logging, ActivityLayer, LoggingOptions};
pub use notifier::{LogNotifier, RecordingNotifier, TelegramNotifier};
pub use report::{
    monthly_summary, CsvReportSink, MemoryReportSink, MonthlySummary, ACTIVITY_LOG_FILE,
    ENTRY_LOG_FILE, MONTHLY_SUMMARY_FILE, TRADE_HISTORY_FILE,
};
