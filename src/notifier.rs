// Best-effort status messages (Discord webhook + log)

use chrono::{FixedOffset, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Outbound status channel. Delivery is best effort: implementations swallow
/// their own failures so a flaky channel never stops trading.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send(&self, text: &str);
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    content: String,
}

/// Posts to a Discord webhook when one is configured; always logs
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: Option<String>,
    offset: FixedOffset,
}

impl WebhookNotifier {
    pub fn new(webhook_url: Option<String>, offset: FixedOffset, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, webhook_url, offset })
    }

    /// Log-only notifier
    pub fn disabled(offset: FixedOffset) -> Self {
        Self { client: Client::new(), webhook_url: None, offset }
    }

    fn stamp(&self, text: &str) -> String {
        let now = Utc::now().with_timezone(&self.offset);
        format_message(&now.format("%Y-%m-%d %H:%M:%S").to_string(), text)
    }
}

pub fn format_message(timestamp: &str, text: &str) -> String {
    format!("[{}] {}", timestamp, text)
}

impl Notifier for WebhookNotifier {
    async fn send(&self, text: &str) {
        let content = self.stamp(text);
        info!(target: "notify", "{}", content);
        crate::log_trading_event(&format!("NOTIFY | {}", text));

        let Some(url) = &self.webhook_url else {
            return;
        };
        let payload = WebhookPayload { content };
        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!("webhook returned status {}", resp.status()),
            Err(e) => warn!("webhook delivery failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_carries_timestamp_prefix() {
        assert_eq!(
            format_message("2024-11-25 09:05:00", "started"),
            "[2024-11-25 09:05:00] started"
        );
    }

    #[tokio::test]
    async fn disabled_notifier_never_fails() {
        let notifier = WebhookNotifier::disabled(FixedOffset::east_opt(9 * 3600).unwrap());
        notifier.send("hello").await;
    }
}
