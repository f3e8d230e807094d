//! Notification seam.
//!
//! Commands and the interpreter push user-facing notifications through this
//! sink; where they end up (desktop, chat, log) is the embedder's choice.

use async_trait::async_trait;

/// Sink for user-facing notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn push(&self, title: &str, body: &str);
}

/// Default sink that forwards notifications to the log.
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn push(&self, title: &str, body: &str) {
        tracing::info!(title, body, "notification");
    }
}
