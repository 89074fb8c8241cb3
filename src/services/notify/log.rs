use super::{Notification, Notifier};
use anyhow::Result;
use async_trait::async_trait;

/// Writes notifications to the log at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        tracing::warn!(
            subject = %notification.subject,
            recipients = ?notification.recipients,
            body = %notification.body,
            "Notification"
        );
        Ok(())
    }
}
