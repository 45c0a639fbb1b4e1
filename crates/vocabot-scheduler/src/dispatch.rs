//! Webhook delivery: POSTs a card to the chat bot webhook.
//! One attempt per message; any failure is reported, never retried.

use std::time::Duration;

use async_trait::async_trait;
use vocabot_core::config::WebhookConfig;
use vocabot_core::error::{Result, VocabotError};
use vocabot_core::traits::Notifier;

/// Feishu/Lark style bot webhook.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(&config.url, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, payload: &serde_json::Value) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| VocabotError::Http(format!("Webhook send failed: {e}")))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        check_webhook_response(status, &body)?;
        tracing::info!("✅ Webhook card delivered");
        Ok(())
    }
}

/// Success means HTTP 200 and a zero status code in the body
/// (`StatusCode` on legacy bots, `code` on newer ones).
pub fn check_webhook_response(status: u16, body: &str) -> Result<()> {
    if status != 200 {
        return Err(VocabotError::Delivery(format!("HTTP {status}: {}", truncate(body))));
    }
    let data: serde_json::Value = serde_json::from_str(body)
        .map_err(|_| VocabotError::Delivery(format!("Unreadable response: {}", truncate(body))))?;

    let code = data
        .get("StatusCode")
        .or_else(|| data.get("code"))
        .and_then(|v| v.as_i64());
    match code {
        Some(0) => Ok(()),
        _ => Err(VocabotError::Delivery(format!("Webhook rejected card: {}", truncate(body)))),
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() > 200 {
        format!("{}...", body.chars().take(200).collect::<String>())
    } else {
        body.to_string()
    }
}
