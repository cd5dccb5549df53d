//! CSV candle source.
//!
//! Accepts comma or tab separated exports with either a combined timestamp
//! column or separate date and time columns (terminal history exports).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use trading_core::error::DataError;
use trading_core::types::Bar;

/// CSV record format.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(
        alias = "Date",
        alias = "<DATE>",
        alias = "timestamp",
        alias = "Timestamp",
        alias = "datetime",
        alias = "Datetime"
    )]
    date: String,
    #[serde(alias = "Time", alias = "<TIME>", default)]
    time: Option<String>,
    #[serde(alias = "Open", alias = "<OPEN>")]
    open: f64,
    #[serde(alias = "High", alias = "<HIGH>")]
    high: f64,
    #[serde(alias = "Low", alias = "<LOW>")]
    low: f64,
    #[serde(alias = "Close", alias = "<CLOSE>")]
    close: f64,
    #[serde(alias = "Volume", alias = "tick_volume", alias = "<TICKVOL>", default)]
    volume: f64,
}

/// CSV file of candles.
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    path: PathBuf,
}

impl CsvBarSource {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DataError::NoDataAvailable);
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn delimiter(&self) -> Result<u8, DataError> {
        let file = File::open(&self.path).map_err(|e| DataError::ParseError(e.to_string()))?;
        let mut header = String::new();
        BufReader::new(file)
            .read_line(&mut header)
            .map_err(|e| DataError::ParseError(e.to_string()))?;
        Ok(if header.contains('\t') { b'\t' } else { b',' })
    }

    /// Load every valid candle, sorted and de-duplicated by timestamp.
    ///
    /// Rows whose prices are inconsistent (high below low, close outside the
    /// range, non-positive prices) are skipped with a warning.
    pub fn load(&self) -> Result<Vec<Bar>, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(self.delimiter()?)
            .from_path(&self.path)
            .map_err(|e| DataError::ParseError(e.to_string()))?;

        let mut bars = Vec::new();
        let mut skipped = 0usize;

        for (row, result) in reader.deserialize().enumerate() {
            let record: CsvRecord = result.map_err(|e| DataError::ParseError(e.to_string()))?;
            let timestamp = parse_timestamp(&record.date, record.time.as_deref())?;
            let bar = Bar::new(
                timestamp,
                record.open,
                record.high,
                record.low,
                record.close,
                record.volume,
            );

            if is_consistent(&bar) {
                bars.push(bar);
            } else {
                skipped += 1;
                warn!(row = row + 2, timestamp, "Skipping inconsistent candle");
            }
        }

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);

        if bars.is_empty() {
            return Err(DataError::NoDataAvailable);
        }
        debug!(path = %self.path.display(), bars = bars.len(), skipped, "Loaded candles");
        Ok(bars)
    }
}

fn is_consistent(bar: &Bar) -> bool {
    bar.low > 0.0
        && bar.high >= bar.low
        && (bar.low..=bar.high).contains(&bar.open)
        && (bar.low..=bar.high).contains(&bar.close)
}

/// Parse a timestamp, optionally combined with a separate time-of-day column.
fn parse_timestamp(date: &str, time: Option<&str>) -> Result<i64, DataError> {
    if let Some(time) = time.filter(|t| !t.is_empty()) {
        let day = parse_date(date)?;
        let clock = ["%H:%M:%S", "%H:%M"]
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(time, f).ok())
            .ok_or_else(|| DataError::ParseError(format!("Could not parse time: {}", time)))?;
        return Ok(day.and_time(clock).and_utc().timestamp_millis());
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y.%m.%d %H:%M:%S",
        "%Y.%m.%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(date, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }

    if let Ok(day) = parse_date(date) {
        return Ok(day.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
    }

    // Unix timestamp, milliseconds when it has more than 10 digits
    if let Ok(ts) = date.parse::<i64>() {
        return Ok(if ts > 10_000_000_000 { ts } else { ts * 1000 });
    }

    Err(DataError::ParseError(format!("Could not parse date: {}", date)))
}

fn parse_date(date: &str) -> Result<NaiveDate, DataError> {
    ["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%m/%d/%Y"]
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(date, f).ok())
        .ok_or_else(|| DataError::ParseError(format!("Could not parse date: {}", date)))
}
