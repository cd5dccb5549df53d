//! Outbound alert channel.

use async_trait::async_trait;

/// Fire-and-forget alert delivery.
///
/// Implementations log their own failures; a failed alert never propagates
/// into trading logic.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a short HTML-formatted message.
    async fn send_alert(&self, text: &str);
}
