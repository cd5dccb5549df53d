//! CSV trade reports.
//!
//! A report directory holds three files:
//! - `trade_history.csv`: one row per closed trade, rewritten atomically
//! - `monthly_summary.csv`: profit, loss and net per exit month, recomputed
//!   with every trade
//! - `activity_log.csv`: append-only warnings and errors
//! - `entry_log.csv`: append-only levels and readings of each entry attempt

use chrono::Local;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error};
use trading_core::error::ReportError;
use trading_core::traits::ReportSink;
use trading_core::types::{EntryDecision, TradeRecord};
use trading_state::AtomicFile;

pub const TRADE_HISTORY_FILE: &str = "trade_history.csv";
pub const MONTHLY_SUMMARY_FILE: &str = "monthly_summary.csv";
pub const ACTIVITY_LOG_FILE: &str = "activity_log.csv";
pub const ENTRY_LOG_FILE: &str = "entry_log.csv";

/// Totals of the trades that exited in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    #[serde(rename = "Month")]
    pub month: String,
    #[serde(rename = "Total Profit ($)")]
    pub total_profit: Decimal,
    /// Sum of losing trades, zero or negative
    #[serde(rename = "Total Loss ($)")]
    pub total_loss: Decimal,
    #[serde(rename = "Net Profit/Loss ($)")]
    pub net: Decimal,
}

/// Group trades by exit month, oldest month first.
pub fn monthly_summary(trades: &[TradeRecord]) -> Vec<MonthlySummary> {
    let mut months: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for trade in trades {
        let entry = months
            .entry(trade.exit_time.format("%Y-%m").to_string())
            .or_default();
        if trade.profit > Decimal::ZERO {
            entry.0 += trade.profit;
        } else {
            entry.1 += trade.profit;
        }
    }

    months
        .into_iter()
        .map(|(month, (total_profit, total_loss))| MonthlySummary {
            month,
            total_profit,
            total_loss,
            net: total_profit + total_loss,
        })
        .collect()
}

/// Report sink writing CSV files into one directory.
#[derive(Debug)]
pub struct CsvReportSink {
    dir: PathBuf,
    trades: AtomicFile,
    summary: AtomicFile,
    trades_lock: Mutex<()>,
    /// Separate from `trades_lock` so a warning raised while trades are
    /// written can still reach the activity log.
    activity_lock: Mutex<()>,
    entries_lock: Mutex<()>,
}

impl CsvReportSink {
    /// Open the report directory, creating it when missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;

        let sink = Self {
            trades: AtomicFile::new(dir.join(TRADE_HISTORY_FILE)),
            summary: AtomicFile::new(dir.join(MONTHLY_SUMMARY_FILE)),
            dir,
            trades_lock: Mutex::new(()),
            activity_lock: Mutex::new(()),
            entries_lock: Mutex::new(()),
        };
        for file in [&sink.trades, &sink.summary] {
            file.remove_stale_temp()
                .map_err(|source| io_error(&file.temp_path(), source))?;
        }
        Ok(sink)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every logged trade, in the order written.
    pub fn trade_history(&self) -> Result<Vec<TradeRecord>, ReportError> {
        let _guard = self.trades_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_trades()
    }

    /// The summary as last written.
    pub fn monthly_summary(&self) -> Result<Vec<MonthlySummary>, ReportError> {
        let _guard = self.trades_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(bytes) = self.summary.read().map_err(|e| io_error(self.summary.path(), e))? else {
            return Ok(vec![]);
        };
        csv::Reader::from_reader(bytes.as_slice())
            .deserialize()
            .collect::<Result<Vec<MonthlySummary>, _>>()
            .map_err(|e| ReportError::Csv(e.to_string()))
    }

    /// Read the trade history, quarantining it when unreadable. Caller holds
    /// `trades_lock`.
    fn read_trades(&self) -> Result<Vec<TradeRecord>, ReportError> {
        let Some(bytes) = self.trades.read().map_err(|e| io_error(self.trades.path(), e))? else {
            return Ok(vec![]);
        };

        let parsed: Result<Vec<TradeRecord>, csv::Error> =
            csv::Reader::from_reader(bytes.as_slice()).deserialize().collect();
        match parsed {
            Ok(trades) => Ok(trades),
            Err(parse_error) => {
                let backup = self
                    .trades
                    .quarantine()
                    .map_err(|e| io_error(self.trades.path(), e))?;
                error!(
                    severity = "critical",
                    backup = %backup.display(),
                    error = %parse_error,
                    "Trade history is corrupt; archived it and starting a new one"
                );
                Ok(vec![])
            }
        }
    }

    fn write_csv<T: Serialize>(file: &AtomicFile, rows: &[T]) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| ReportError::Csv(e.to_string()))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ReportError::Csv(e.to_string()))?;
        file.write(&bytes).map_err(|e| io_error(file.path(), e))
    }

    /// Open an append-only log, reporting whether it still needs a header.
    fn open_log(&self, name: &str) -> Result<(File, PathBuf, bool), ReportError> {
        let path = self.dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;
        let is_new = file.metadata().map(|m| m.len() == 0).unwrap_or(false);
        Ok((file, path, is_new))
    }
}

impl ReportSink for CsvReportSink {
    fn append_trade_record(&self, record: &TradeRecord) -> Result<(), ReportError> {
        let _guard = self.trades_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut trades = self.read_trades()?;
        trades.push(record.clone());

        Self::write_csv(&self.trades, &trades)?;
        Self::write_csv(&self.summary, &monthly_summary(&trades))?;
        debug!(ticket = record.ticket, "Trade record written");
        Ok(())
    }

    fn append_activity(&self, level: &str, message: &str) -> Result<(), ReportError> {
        let _guard = self.activity_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (file, path, is_new) = self.open_log(ACTIVITY_LOG_FILE)?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer
                .write_record(["Timestamp", "Level", "Message"])
                .map_err(|e| ReportError::Csv(e.to_string()))?;
        }
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        writer
            .write_record([timestamp.as_str(), level, message])
            .map_err(|e| ReportError::Csv(e.to_string()))?;
        writer.flush().map_err(|e| io_error(&path, e))
    }

    fn append_entry_decision(&self, decision: &EntryDecision) -> Result<(), ReportError> {
        let _guard = self.entries_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (file, path, is_new) = self.open_log(ENTRY_LOG_FILE)?;
        let mut writer = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
        writer
            .serialize(decision)
            .map_err(|e| ReportError::Csv(e.to_string()))?;
        writer.flush().map_err(|e| io_error(&path, e))
    }

    fn logged_tickets(&self) -> Result<HashSet<u64>, ReportError> {
        Ok(self.trade_history()?.into_iter().map(|t| t.ticket).collect())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// In-memory report sink.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    trades: Mutex<Vec<TradeRecord>>,
    activity: Mutex<Vec<(String, String)>>,
    entries: Mutex<Vec<EntryDecision>>,
    failing: Mutex<HashSet<u64>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trades(&self) -> Vec<TradeRecord> {
        self.trades.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn entry_decisions(&self) -> Vec<EntryDecision> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Make appending the trade record of `ticket` fail.
    pub fn fail_ticket(&self, ticket: u64) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ticket);
    }

    /// Activity lines as `(level, message)`.
    pub fn activity(&self) -> Vec<(String, String)> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ReportSink for MemoryReportSink {
    fn append_trade_record(&self, record: &TradeRecord) -> Result<(), ReportError> {
        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&record.ticket)
        {
            return Err(ReportError::Csv(format!("ticket {} cannot be written", record.ticket)));
        }
        self.trades
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn append_activity(&self, level: &str, message: &str) -> Result<(), ReportError> {
        self.activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level.to_string(), message.to_string()));
        Ok(())
    }

    fn append_entry_decision(&self, decision: &EntryDecision) -> Result<(), ReportError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decision.clone());
        Ok(())
    }

    fn logged_tickets(&self) -> Result<HashSet<u64>, ReportError> {
        Ok(self.trades().into_iter().map(|t| t.ticket).collect())
    }
}
