//! Historical candle data for paper replays.

mod csv_source;
mod resample;

pub use csv_source::CsvBarSource;
pub use resample::resample;

use std::path::Path;
use trading_core::error::DataError;
use trading_core::types::Bar;

/// Load candles from a CSV file, oldest first.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>, DataError> {
    CsvBarSource::new(path)?.load()
}
