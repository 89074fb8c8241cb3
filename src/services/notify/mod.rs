//! Notification transport.
//!
//! The engine only needs "send a message"; delivery is somebody else's
//! problem. [`LogNotifier`] writes the message to the log, [`WebhookNotifier`]
//! POSTs it as JSON to a relay (mail gateway, chat hook).

mod log;
mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

/// An outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Message transport.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, notification: &Notification) -> Result<()>;
}
