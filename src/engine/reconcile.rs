//! Reconciler: index recordings the catalog hasn't seen yet.

use super::Engine;
use super::classify::SkipReason;
use super::taskgroup::TaskGroup;
use crate::error::{Error, Result};
use crate::services::cameras::CameraMap;
use crate::services::catalog::{Event, EventKey};
use futures::TryStreamExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Outcome of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Objects listed under the prefix.
    pub listed: usize,
    /// Listed objects with the recording content type.
    pub recordings: usize,
    /// Recordings already present in the catalog.
    pub already_indexed: usize,
    /// Recordings skipped, by reason.
    pub skipped: BTreeMap<&'static str, usize>,
    /// Events written.
    pub added: usize,
    /// Catalog commits issued.
    pub batches: usize,
}

impl ScanReport {
    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason.as_str()).or_default() += 1;
    }
}

type Loaded = (Arc<CameraMap>, HashSet<EventKey>);

/// Camera directory and existing identities, loaded while listing starts.
///
/// Classification waits on both at the first recording.
enum Prerequisites {
    Pending(JoinHandle<Result<Loaded>>),
    Ready(Loaded),
}

impl Prerequisites {
    fn start(engine: &Engine, camera: Option<&str>) -> Self {
        let cameras = engine.cameras.clone();
        let catalog = engine.catalog.clone();
        let camera = camera.map(ToString::to_string);
        Self::Pending(tokio::spawn(async move {
            tokio::try_join!(cameras.cameras(), catalog.keys(camera.as_deref()))
        }))
    }

    async fn ready(&mut self, requested: Option<&str>) -> Result<&Loaded> {
        if let Self::Pending(handle) = self {
            let (cameras, existing) = handle
                .await
                .map_err(|e| Error::TaskPanicked(e.to_string()))??;
            if let Some(camera) = requested
                && !cameras.contains_key(camera)
            {
                return Err(Error::camera_not_found(camera));
            }
            tracing::debug!(
                cameras = cameras.len(),
                indexed = existing.len(),
                "Scan prerequisites loaded"
            );
            *self = Self::Ready((cameras, existing));
        }
        match self {
            Self::Ready(loaded) => Ok(loaded),
            Self::Pending(_) => Err(Error::TaskPanicked(
                "scan prerequisites unavailable".to_string(),
            )),
        }
    }
}

impl Drop for Prerequisites {
    fn drop(&mut self) {
        if let Self::Pending(handle) = self {
            handle.abort();
        }
    }
}

impl Engine {
    /// Index every recording under `camera/` (or the whole store) that the
    /// catalog doesn't hold yet.
    ///
    /// Repeated scans over an unchanged store add nothing. Objects that fail
    /// classification are logged and skipped. Staged events are committed in
    /// concurrent batches; the first failed batch is the scan's error and
    /// batches already committed stay committed.
    ///
    /// # Errors
    ///
    /// Listing failure, prerequisite load failure, [`Error::CameraNotFound`]
    /// for an unknown requested camera, or a failed catalog commit.
    pub async fn scan(&self, camera: Option<&str>) -> Result<ScanReport> {
        let mut prerequisites = Prerequisites::start(self, camera);
        let prefix = camera.map(|c| format!("{c}/"));
        let mut listing = self.storage.list_stream(prefix.as_deref());

        let mut report = ScanReport::default();
        let mut staged: Vec<Event> = Vec::new();
        let mut staged_keys: HashSet<EventKey> = HashSet::new();

        while let Some(object) = listing.try_next().await.map_err(Error::Storage)? {
            report.listed += 1;
            if !self.classifier.is_recording(&object) {
                continue;
            }
            report.recordings += 1;

            let (cameras, existing) = prerequisites.ready(camera).await?;
            let event = match self
                .classifier
                .classify(&object, |id| cameras.contains_key(id))
            {
                Ok(event) => event,
                Err(reason) => {
                    match reason {
                        SkipReason::UnknownCamera | SkipReason::BadPath => {
                            tracing::warn!(path = %object.path, reason = reason.as_str(), "Skipping object");
                        },
                        SkipReason::NoCaptureTime | SkipReason::NoDuration => {
                            tracing::info!(path = %object.path, reason = reason.as_str(), "Skipping object");
                        },
                    }
                    report.skip(reason);
                    continue;
                },
            };

            let identity = event.identity();
            if existing.contains(&identity) || !staged_keys.insert(identity.clone()) {
                report.already_indexed += 1;
                continue;
            }
            tracing::debug!(identity = %identity, captured = %event.timestamp, "Staging event");
            staged.push(event);
        }

        report.added = staged.len();
        report.batches = self.commit(staged).await?;

        tracing::info!(
            camera = camera.unwrap_or("*"),
            listed = report.listed,
            added = report.added,
            batches = report.batches,
            "Scan complete"
        );
        Ok(report)
    }

    /// Commit events in concurrent batches; returns the number of batches.
    async fn commit(&self, mut staged: Vec<Event>) -> Result<usize> {
        let batch_size = self.settings.batch_size.max(1);
        let mut group = TaskGroup::new();
        let mut batches = 0;

        while !staged.is_empty() {
            let rest = staged.split_off(batch_size.min(staged.len()));
            let batch = std::mem::replace(&mut staged, rest);
            let catalog = self.catalog.clone();
            let size = batch.len();
            batches += 1;
            group.spawn(async move {
                catalog.put_batch(batch).await?;
                tracing::debug!(size, "Stored event batch");
                Ok(())
            });
        }

        group.wait().await?;
        Ok(batches)
    }
}
