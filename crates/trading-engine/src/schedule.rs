//! Loop cadence and trading hours.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trading_core::error::TradingError;

/// Control loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Pause between ticks while the market is open
    pub poll_interval_secs: u64,
    /// Pause while outside trading hours
    pub closed_market_sleep_secs: u64,
    /// Pause after a failed tick
    pub error_cooldown_secs: u64,
    /// Only trade on weekdays within the configured hours
    pub check_market_hours: bool,
    /// First trading hour (UTC, inclusive)
    pub start_hour: Option<u32>,
    /// Last trading hour (UTC, exclusive)
    pub end_hour: Option<u32>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            closed_market_sleep_secs: 300,
            error_cooldown_secs: 60,
            check_market_hours: true,
            start_hour: None,
            end_hour: None,
        }
    }
}

impl ScheduleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn closed_market_sleep(&self) -> Duration {
        Duration::from_secs(self.closed_market_sleep_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        if self.start_hour.is_some_and(|h| h > 23) {
            return Err(TradingError::Config("schedule: start_hour must be 0-23".to_string()));
        }
        if self.end_hour.is_some_and(|h| h == 0 || h > 24) {
            return Err(TradingError::Config("schedule: end_hour must be 1-24".to_string()));
        }
        if self.start_hour.is_some() && self.start_hour == self.end_hour {
            return Err(TradingError::Config(
                "schedule: start_hour and end_hour leave no trading time".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(TradingError::Config(
                "schedule: poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Check whether `now` falls inside trading hours.
    ///
    /// A window whose end is before its start wraps past midnight.
    pub fn is_trading_time(&self, now: DateTime<Utc>) -> bool {
        if !self.check_market_hours {
            return true;
        }
        if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let hour = now.hour();
        match (self.start_hour, self.end_hour) {
            (Some(start), Some(end)) if start <= end => hour >= start && hour < end,
            (Some(start), Some(end)) => hour >= start || hour < end,
            (Some(start), None) => hour >= start,
            (None, Some(end)) => hour < end,
            (None, None) => true,
        }
    }
}
