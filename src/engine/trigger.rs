//! Scan fan-out and the in-process scan queue.
//!
//! Uploaders announce new files per camera; each announcement becomes a
//! camera-scoped scan request. Requests are fire-and-forget: a worker runs
//! them one at a time and only logs failures.

use super::Engine;
use crate::error::{Error, Result};
use anyhow::bail;
use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Somewhere to send camera-scoped scan requests.
#[async_trait]
pub trait ScanTrigger: Send + Sync + 'static {
    /// Enqueue a scan of one camera. Returns once the request is accepted.
    async fn request_scan(&self, camera: &str) -> anyhow::Result<()>;
}

/// In-process queue of scan requests.
///
/// A camera already waiting in the queue is not queued twice. Once its scan
/// starts, a new request queues it again.
#[derive(Clone)]
pub struct ScanQueue {
    tx: mpsc::UnboundedSender<String>,
    pending: Arc<DashSet<String>>,
}

impl ScanQueue {
    /// Start the worker. It stops when every queue handle is dropped.
    pub fn start(engine: Engine) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let pending: Arc<DashSet<String>> = Arc::default();
        let worker_pending = Arc::clone(&pending);

        let worker = tokio::spawn(async move {
            while let Some(camera) = rx.recv().await {
                worker_pending.remove(&camera);
                let result = engine
                    .bounded("scan", engine.scan(Some(&camera)))
                    .await;
                match result {
                    Ok(report) => {
                        tracing::debug!(camera = %camera, added = report.added, "Queued scan finished");
                    },
                    Err(e) => {
                        tracing::error!(camera = %camera, error = %e, "Queued scan failed");
                    },
                }
            }
            tracing::debug!("Scan queue closed");
        });

        (Self { tx, pending }, worker)
    }

    /// Number of cameras waiting for a scan.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl ScanTrigger for ScanQueue {
    async fn request_scan(&self, camera: &str) -> anyhow::Result<()> {
        if !self.pending.insert(camera.to_string()) {
            tracing::debug!(camera, "Scan already queued");
            return Ok(());
        }
        if self.tx.send(camera.to_string()).is_err() {
            self.pending.remove(camera);
            bail!("scan queue is closed");
        }
        Ok(())
    }
}

impl Engine {
    /// Enqueue one scan per known camera; returns how many were enqueued.
    ///
    /// # Errors
    ///
    /// Camera directory failure or the first rejected request.
    pub async fn scan_all(&self, trigger: &dyn ScanTrigger) -> Result<usize> {
        let cameras = self.cameras.cameras().await?;
        let mut ids: Vec<&String> = cameras.keys().collect();
        ids.sort();

        for id in &ids {
            trigger.request_scan(id).await.map_err(Error::Trigger)?;
        }
        tracing::info!(count = ids.len(), "Enqueued camera scans");
        Ok(ids.len())
    }
}
