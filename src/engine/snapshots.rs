//! Snapshot monitor: prune old snapshots and report silent cameras.
//!
//! Snapshots live at `<prefix>/<camera>/<filename>`. One sweep moves
//! through `Listing -> Evaluating -> Draining -> Notifying -> Done`:
//! listing failures abort, unreadable entries are skipped, failed deletes
//! are collected while the rest finish, and the notification never fails
//! the sweep.

use super::Engine;
use super::classify::split_path;
use super::taskgroup::TaskGroup;
use crate::error::{Error, Result};
use crate::services::notify::Notification;
use crate::services::storage::StorageService;
use chrono::{DateTime, TimeDelta, Utc};
use futures::TryStreamExt;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepPhase {
    Listing,
    Evaluating,
    Draining,
    Notifying,
    Done,
}

fn transition(from: SweepPhase, to: SweepPhase) -> SweepPhase {
    if from != to {
        tracing::debug!(from = ?from, to = ?to, "Snapshot sweep phase");
    }
    to
}

/// A camera whose newest snapshot is older than the warning age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleCamera {
    pub camera: String,
    pub last_seen: DateTime<Utc>,
}

/// Outcome of a snapshot sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub listed: usize,
    /// Snapshots past the deletion age.
    pub scheduled: usize,
    pub deleted: usize,
    /// Most recent snapshot per camera.
    pub recency: HashMap<String, DateTime<Utc>>,
    pub stale: Vec<StaleCamera>,
    /// Whether a notification was handed to the transport successfully.
    pub notified: bool,
}

/// Cameras whose last snapshot is older than `warning_age`, sorted by id.
pub fn stale_cameras(
    recency: &HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
    warning_age: TimeDelta,
) -> Vec<StaleCamera> {
    let mut stale: Vec<StaleCamera> = recency
        .iter()
        .filter(|(_, last_seen)| now - **last_seen > warning_age)
        .map(|(camera, last_seen)| StaleCamera {
            camera: camera.clone(),
            last_seen: *last_seen,
        })
        .collect();
    stale.sort_by(|a, b| a.camera.cmp(&b.camera));
    stale
}

impl Engine {
    /// Sweep the snapshot namespace.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an age setting out of range, a listing failure,
    /// or the first failed snapshot deletion.
    pub async fn sweep_snapshots(&self) -> Result<SnapshotReport> {
        self.sweep_snapshots_at(Utc::now()).await
    }

    /// [`Engine::sweep_snapshots`] against an explicit clock.
    pub async fn sweep_snapshots_at(&self, now: DateTime<Utc>) -> Result<SnapshotReport> {
        let max_age = self.settings.snapshot_max_age()?;
        let warning_age = self.settings.snapshot_warning_age()?;
        let prefix = format!("{}/", self.settings.snapshot_prefix.trim_end_matches('/'));

        let mut phase = SweepPhase::Listing;
        let mut report = SnapshotReport::default();
        let mut group = TaskGroup::new();
        let deleted = Arc::new(AtomicUsize::new(0));

        let mut listing = self.storage.list_stream(Some(&prefix));
        while let Some(object) = listing.try_next().await.map_err(Error::Storage)? {
            phase = transition(phase, SweepPhase::Evaluating);
            report.listed += 1;

            let Some((camera, filename)) = object
                .path
                .strip_prefix(&prefix)
                .and_then(split_path)
            else {
                tracing::debug!(path = %object.path, "Skipping snapshot with unexpected name");
                continue;
            };
            let Some(captured) = self.classifier.capture_time(&object.metadata, filename) else {
                tracing::info!(path = %object.path, "Failed to parse snapshot time");
                continue;
            };

            report
                .recency
                .entry(camera.to_string())
                .and_modify(|seen| *seen = (*seen).max(captured))
                .or_insert(captured);

            let age = now - captured;
            if age > max_age {
                report.scheduled += 1;
                group.spawn_bounded(
                    &self.delete_permits,
                    delete_snapshot(
                        self.storage.clone(),
                        object.path.clone(),
                        Arc::clone(&deleted),
                    ),
                );
            }
        }

        tracing::info!(count = report.scheduled, "Deleting snapshots");
        for (camera, last_seen) in &report.recency {
            tracing::info!(camera = %camera, last_seen = %last_seen, age_secs = (now - *last_seen).num_seconds(), "Most recent snapshot");
        }
        report.stale = stale_cameras(&report.recency, now, warning_age);

        phase = transition(phase, SweepPhase::Draining);
        let drained = group.wait().await;
        report.deleted = deleted.load(Ordering::Relaxed);

        phase = transition(phase, SweepPhase::Notifying);
        if !report.stale.is_empty() {
            report.notified = self.notify_stale(&report.stale, now).await;
        }

        transition(phase, SweepPhase::Done);
        drained?;
        Ok(report)
    }

    /// Render and send the stale-camera message. Failures are logged.
    async fn notify_stale(&self, stale: &[StaleCamera], now: DateTime<Utc>) -> bool {
        let cameras = match self.cameras.cameras().await {
            Ok(cameras) => Some(cameras),
            Err(e) => {
                tracing::warn!(error = %e, "Camera directory unavailable, naming cameras by id");
                None
            },
        };
        let zone = self.classifier.zone();

        let mut body = String::from("The following cameras have not sent a snapshot recently:\n\n");
        for entry in stale {
            let name = cameras
                .as_ref()
                .and_then(|c| c.get(&entry.camera))
                .map_or(entry.camera.as_str(), |c| c.display_name());
            let minutes = (now - entry.last_seen).num_minutes();
            let _ = writeln!(
                body,
                "  {name}: last seen {} ({minutes} minutes ago)",
                zone.display(entry.last_seen)
            );
        }

        let notification = Notification {
            sender: self.notify.sender.clone(),
            recipients: self.notify.recipients.clone(),
            subject: self.notify.subject.clone(),
            body,
        };
        tracing::info!(cameras = stale.len(), "Sending stale camera notification");
        match self.notifier.send(&notification).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to send stale camera notification");
                false
            },
        }
    }
}

async fn delete_snapshot(storage: StorageService, path: String, deleted: Arc<AtomicUsize>) -> Result<()> {
    tracing::debug!(path = %path, "Deleting snapshot");
    if storage.delete_object(&path).await.map_err(Error::Storage)? {
        deleted.fetch_add(1, Ordering::Relaxed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_set() {
        let now = Utc::now();
        let recency = HashMap::from([
            ("basement".to_string(), now - TimeDelta::minutes(40)),
            ("garage".to_string(), now - TimeDelta::minutes(5)),
        ]);
        let stale = stale_cameras(&recency, now, TimeDelta::minutes(25));
        let ids: Vec<_> = stale.iter().map(|s| s.camera.as_str()).collect();
        assert_eq!(ids, ["basement"]);
    }

    #[test]
    fn test_exactly_at_warning_age_is_fresh() {
        let now = Utc::now();
        let recency = HashMap::from([("porch".to_string(), now - TimeDelta::minutes(25))]);
        assert!(stale_cameras(&recency, now, TimeDelta::minutes(25)).is_empty());
    }
}
