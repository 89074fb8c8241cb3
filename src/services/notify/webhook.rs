use super::{Notification, Notifier};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs notifications as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .pool_max_idle_per_host(1)
            .build()
            .context("Failed to create webhook client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .with_context(|| format!("Failed to reach notification webhook {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Notification webhook {} answered {status}", self.url);
        }
        tracing::debug!(subject = %notification.subject, "Notification delivered");
        Ok(())
    }
}
