//! Alert transport port
//!
//! The engine formats alert payloads and records dispatch outcomes; the
//! actual delivery (Telegram, Bale, email, webhook) lives behind the
//! [`AlertSender`] trait. Throttling and deduplication are the transport's
//! concern, not the engine's.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

/// Everything a transport needs to render one notification.
#[derive(Debug, Clone)]
pub struct AlertData {
    /// Id of the check or agent the alert is about
    pub monitor_id: i64,

    /// Display name of the check or agent
    pub monitor_name: String,

    /// Observed state, e.g. `down`, `timeout`, or a threshold condition
    pub status: String,

    /// Failure detail when the observation carried one
    pub error: String,

    /// Response time of the triggering observation, 0 when not applicable
    pub response_time_ms: i64,

    /// When the triggering observation was made
    pub checked_at: DateTime<Utc>,

    /// The monitored target (URL, host, or agent label)
    pub target: String,

    /// Extra transport-visible context (thresholds, last-seen, ...)
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Delivery channel abstraction; implementations are opaque endpoints.
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send_alert(&self, data: &AlertData) -> anyhow::Result<()>;
}

/// Render the message body persisted alongside each dispatch attempt.
pub fn format_alert_message(data: &AlertData) -> String {
    let mut message = format!(
        "🔔 **{}** is **{}**\nTarget: {}\nChecked at: {}",
        data.monitor_name,
        data.status,
        data.target,
        data.checked_at.to_rfc3339(),
    );
    if data.response_time_ms > 0 {
        message.push_str(&format!("\nResponse time: {} ms", data.response_time_ms));
    }
    if !data.error.is_empty() {
        message.push_str(&format!("\nDetail: {}", data.error));
    }
    for (key, value) in &data.metadata {
        message.push_str(&format!("\n{key}: {value}"));
    }
    message
}

/// Webhook transport: posts the alert as JSON to a configured URL.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: Client,
    url: String,
}

impl WebhookSender {
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSender for WebhookSender {
    async fn send_alert(&self, data: &AlertData) -> anyhow::Result<()> {
        let payload = json!({
            "monitor_id": data.monitor_id,
            "monitor": data.monitor_name,
            "status": data.status,
            "error": data.error,
            "response_time_ms": data.response_time_ms,
            "target": data.target,
            "message": format_alert_message(data),
            "metadata": data.metadata,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("webhook alert failed with status: {}", response.status());
        }

        info!(monitor = %data.monitor_name, "webhook alert sent");
        Ok(())
    }
}

/// Transport that only logs; the binary's default when no webhook is
/// configured.
#[derive(Debug, Clone, Default)]
pub struct LogSender;

#[async_trait]
impl AlertSender for LogSender {
    async fn send_alert(&self, data: &AlertData) -> anyhow::Result<()> {
        debug!(
            monitor = %data.monitor_name,
            status = %data.status,
            "alert (no transport configured)"
        );
        Ok(())
    }
}
