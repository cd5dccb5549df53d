//! Alert delivery.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use trading_core::error::TradingError;
use trading_core::traits::Notifier;

const TELEGRAM_API: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API notifier.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: impl Into<String>) -> Result<Self, TradingError> {
        Self::with_api(TELEGRAM_API, token, chat_id)
    }

    fn with_api(api: &str, token: &str, chat_id: impl Into<String>) -> Result<Self, TradingError> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| TradingError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{api}/bot{token}/sendMessage"),
            chat_id: chat_id.into(),
        })
    }

    /// Read the bot token and chat id from the named environment variables.
    pub fn from_env(token_var: &str, chat_id_var: &str) -> Result<Self, TradingError> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| TradingError::Config(format!("{name} not set")))
        };
        Self::new(&read(token_var)?, read(chat_id_var)?)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_alert(&self, text: &str) {
        let params = [
            ("chat_id", self.chat_id.as_str()),
            ("text", text),
            ("parse_mode", "HTML"),
        ];

        match self.client.post(&self.url).form(&params).send().await {
            Ok(resp) if resp.status().is_success() => debug!("Telegram alert sent"),
            Ok(resp) => warn!(status = %resp.status(), "Telegram alert rejected"),
            // The request URL embeds the bot token.
            Err(e) => warn!(error = %e.without_url(), "Telegram alert failed"),
        }
    }
}

/// Writes alerts to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_alert(&self, text: &str) {
        info!(alert = %text, "Alert");
    }
}

/// Keeps every alert in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of alerts containing `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages().iter().filter(|m| m.contains(needle)).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_alert(&self, text: &str) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }
}
