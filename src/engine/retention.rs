//! Retention sweeper: expunge events past the retention horizon.

use super::Engine;
use super::taskgroup::TaskGroup;
use crate::error::{Error, Result};
use crate::services::Keyable;
use crate::services::catalog::{CatalogIndex, EventKey, EventOrder, EventQuery};
use crate::services::storage::StorageService;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of an expunge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpungeReport {
    /// Events matched by the horizon query.
    pub scheduled: usize,
    /// Events removed from the catalog.
    pub expunged: usize,
    /// Blob variants deleted.
    pub blobs_deleted: usize,
    /// Blob variants whose deletion failed (logged, not fatal).
    pub blob_failures: usize,
}

#[derive(Default)]
struct Counters {
    expunged: AtomicUsize,
    blobs_deleted: AtomicUsize,
    blob_failures: AtomicUsize,
}

impl Engine {
    /// Remove every event captured at or before `now - retention`, along
    /// with its blob variants.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a retention horizon out of range, a catalog
    /// query failure, or the first failed catalog deletion.
    /// Blob deletion failures are only logged.
    pub async fn expunge(&self) -> Result<ExpungeReport> {
        self.expunge_at(Utc::now()).await
    }

    /// [`Engine::expunge`] against an explicit clock.
    pub async fn expunge_at(&self, now: DateTime<Utc>) -> Result<ExpungeReport> {
        let retention = self.settings.retention()?;
        let cutoff = now.checked_sub_signed(retention).ok_or_else(|| {
            Error::Config(format!(
                "retention of {} days reaches past the representable time range",
                retention.num_days()
            ))
        })?;
        let counters = Arc::new(Counters::default());
        let extensions: Arc<[String]> = self.settings.blob_extensions.clone().into();
        let mut group = TaskGroup::new();
        let mut scheduled = 0;

        let mut query = EventQuery::new(self.settings.page_size)
            .order(EventOrder::Oldest)
            .captured_until(cutoff);
        loop {
            let page = self.catalog.query(&query).await?;
            for event in page.events {
                let key = event.key().cloned().unwrap_or_else(|| event.identity());
                tracing::debug!(identity = %key, captured = %event.timestamp, "Expunging event");
                scheduled += 1;
                group.spawn_bounded(
                    &self.delete_permits,
                    expunge_one(
                        self.storage.clone(),
                        self.catalog.clone(),
                        key,
                        Arc::clone(&extensions),
                        Arc::clone(&counters),
                    ),
                );
            }

            // A failed catalog delete ends the pass; stop feeding more work.
            if group.has_failed() {
                break;
            }
            match page.cursor {
                Some(cursor) => query = query.after(Some(cursor)),
                None => break,
            }
        }

        tracing::info!(scheduled, cutoff = %cutoff, "Waiting for expunge tasks");
        group.wait().await?;

        let report = ExpungeReport {
            scheduled,
            expunged: counters.expunged.load(Ordering::Relaxed),
            blobs_deleted: counters.blobs_deleted.load(Ordering::Relaxed),
            blob_failures: counters.blob_failures.load(Ordering::Relaxed),
        };
        tracing::info!(
            expunged = report.expunged,
            blobs_deleted = report.blobs_deleted,
            blob_failures = report.blob_failures,
            "Expunge complete"
        );
        Ok(report)
    }
}

async fn expunge_one(
    storage: StorageService,
    catalog: CatalogIndex,
    key: EventKey,
    extensions: Arc<[String]>,
    counters: Arc<Counters>,
) -> Result<()> {
    for ext in extensions.iter() {
        let path = format!("{key}.{ext}");
        match storage.delete_object(&path).await {
            Ok(true) => {
                counters.blobs_deleted.fetch_add(1, Ordering::Relaxed);
            },
            Ok(false) => {},
            Err(e) => {
                counters.blob_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(path, error = %e, "Failed to delete blob");
            },
        }
    }

    catalog.delete(&key).await?;
    counters.expunged.fetch_add(1, Ordering::Relaxed);
    Ok(())
}
