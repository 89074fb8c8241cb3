//! End-to-end engine tests over the in-memory backends.
//!
//! Run with:
//! ```bash
//! cargo test --test engine_tests
//! ```

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use clipkeep::Error;
use clipkeep::config::{EngineConfig, NotifyConfig};
use clipkeep::engine::backfill::DurationProber;
use clipkeep::engine::{Engine, ScanTrigger};
use clipkeep::services::cameras::{Camera, CameraDirectory};
use clipkeep::services::catalog::{
    CatalogBackend, CatalogIndex, Event, EventFilter, EventKey, EventOrder, EventQuery,
    MemoryCatalogBackend, Position,
};
use clipkeep::services::notify::{Notification, Notifier};
use clipkeep::services::storage::{
    MemoryStorageBackend, ObjectMeta, ObjectPage, StorageBackend, StorageService, UserMetadata,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Fixtures
// =============================================================================

fn cameras() -> CameraDirectory {
    CameraDirectory::fixed([
        Camera::new("garage", "Garage"),
        Camera::new("porch", "Front Porch"),
    ])
}

fn engine_with(storage: StorageService, catalog: CatalogIndex) -> Engine {
    Engine::builder(storage, catalog, cameras()).build()
}

fn meta(pairs: &[(&str, &str)]) -> UserMetadata {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

async fn put_recording(storage: &StorageService, path: &str, pairs: &[(&str, &str)]) {
    storage
        .put_object(path, b"clip", Some("video/mp4"), meta(pairs))
        .await
        .unwrap();
}

async fn put_blob(storage: &StorageService, path: &str) {
    storage
        .put_object(path, b"blob", None, UserMetadata::new())
        .await
        .unwrap();
}

async fn all_events(catalog: &CatalogIndex) -> Vec<Event> {
    catalog
        .query(&EventQuery::new(10_000))
        .await
        .unwrap()
        .events
}

#[derive(Default, Clone)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
        bail!("relay unreachable")
    }
}

#[derive(Default)]
struct RecordingTrigger {
    requests: Mutex<Vec<String>>,
}

#[async_trait]
impl ScanTrigger for RecordingTrigger {
    async fn request_scan(&self, camera: &str) -> anyhow::Result<()> {
        self.requests.lock().push(camera.to_string());
        Ok(())
    }
}

struct FixedProber(Duration);

#[async_trait]
impl DurationProber for FixedProber {
    async fn probe(&self, name: &str, _data: &[u8]) -> anyhow::Result<Duration> {
        if name.contains("corrupt") {
            bail!("moov atom not found");
        }
        Ok(self.0)
    }
}

/// Catalog that rejects any batch containing `poison` and any delete of it.
struct PoisonedCatalog {
    inner: MemoryCatalogBackend,
    poison: EventKey,
}

#[async_trait]
impl CatalogBackend for PoisonedCatalog {
    async fn query(
        &self,
        filter: &EventFilter,
        after: Option<&Position>,
        limit: usize,
    ) -> anyhow::Result<Vec<Event>> {
        self.inner.query(filter, after, limit).await
    }

    async fn keys(&self, camera: Option<&str>) -> anyhow::Result<HashSet<EventKey>> {
        self.inner.keys(camera).await
    }

    async fn get(&self, key: &EventKey) -> anyhow::Result<Option<Event>> {
        self.inner.get(key).await
    }

    async fn put_batch(&self, events: Vec<Event>) -> anyhow::Result<()> {
        if events.iter().any(|e| e.identity() == self.poison) {
            bail!("transaction aborted");
        }
        self.inner.put_batch(events).await
    }

    async fn delete(&self, key: &EventKey) -> anyhow::Result<bool> {
        if *key == self.poison {
            bail!("delete rejected");
        }
        self.inner.delete(key).await
    }
}

/// Object store whose deletes fail for the listed paths.
struct FaultyStorage {
    inner: MemoryStorageBackend,
    failing_deletes: HashSet<String>,
}

impl FaultyStorage {
    fn service(inner: &MemoryStorageBackend, failing: &[&str]) -> StorageService {
        StorageService::custom(Self {
            inner: inner.clone(),
            failing_deletes: failing.iter().map(ToString::to_string).collect(),
        })
    }
}

#[async_trait]
impl StorageBackend for FaultyStorage {
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: UserMetadata,
    ) -> anyhow::Result<ObjectMeta> {
        self.inner.put(path, data, content_type, metadata).await
    }

    async fn get(&self, path: &str) -> anyhow::Result<Option<(Vec<u8>, ObjectMeta)>> {
        self.inner.get(path).await
    }

    async fn delete(&self, path: &str) -> anyhow::Result<bool> {
        if self.failing_deletes.contains(path) {
            bail!("permission denied: {path}");
        }
        self.inner.delete(path).await
    }

    async fn head(&self, path: &str) -> anyhow::Result<Option<ObjectMeta>> {
        self.inner.head(path).await
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        after: Option<&str>,
        limit: usize,
    ) -> anyhow::Result<ObjectPage> {
        self.inner.list(prefix, after, limit).await
    }

    async fn update_metadata(
        &self,
        path: &str,
        metadata: UserMetadata,
    ) -> anyhow::Result<Option<ObjectMeta>> {
        self.inner.update_metadata(path, metadata).await
    }
}

/// Filename stems for `count` recordings one second apart.
fn stems(count: usize) -> Vec<String> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    (0..count)
        .map(|i| {
            (start + TimeDelta::seconds(i as i64))
                .format("%Y%m%d%H%M%S")
                .to_string()
        })
        .collect()
}

// =============================================================================
// Scan
// =============================================================================

#[tokio::test]
async fn scan_indexes_each_recording_once() {
    let storage = StorageService::memory();
    let catalog = CatalogIndex::memory();
    let engine = engine_with(storage.clone(), catalog.clone());

    put_recording(&storage, "garage/20240101080000.mp4", &[("duration", "12s"), ("motion", "high")]).await;
    put_recording(&storage, "porch/20240101090000.mp4", &[("duration", "3.5s")]).await;
    put_blob(&storage, "garage/20240101080000.jpg").await;

    let first = engine.scan(None).await.unwrap();
    assert_eq!(first.listed, 3);
    assert_eq!(first.recordings, 2);
    assert_eq!(first.added, 2);
    assert_eq!(first.batches, 1);

    let second = engine.scan(None).await.unwrap();
    assert_eq!(second.added, 0);
    assert_eq!(second.already_indexed, 2);
    assert_eq!(second.batches, 0);

    let events = all_events(&catalog).await;
    assert_eq!(events.len(), 2);

    let garage = &events[0];
    assert_eq!(garage.camera, "garage");
    assert_eq!(garage.filename, "20240101080000");
    // 08:00 Pacific standard time.
    assert_eq!(garage.timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap());
    assert_eq!(garage.duration, Duration::from_secs(12));
    assert_eq!(garage.metadata, vec![("motion".to_string(), "high".to_string())]);
    assert_eq!(events[1].duration, Duration::from_millis(3500));
}

#[tokio::test]
async fn scan_skips_recordings_without_duration_or_time() {
    let storage = StorageService::memory();
    let catalog = CatalogIndex::memory();
    let engine = engine_with(storage.clone(), catalog.clone());

    put_recording(&storage, "garage/20240101080000.mp4", &[]).await;
    put_recording(&storage, "garage/clip.mp4", &[("duration", "5s")]).await;
    put_recording(&storage, "attic/20240101080000.mp4", &[("duration", "5s")]).await;
    put_recording(&storage, "loose.mp4", &[("duration", "5s")]).await;
    put_recording(
        &storage,
        "porch/manual.mp4",
        &[("duration", "5s"), ("captured", "2024-02-01T10:00:00Z")],
    )
    .await;

    let report = engine.scan(None).await.unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(report.skipped.get("no_duration"), Some(&1));
    assert_eq!(report.skipped.get("no_capture_time"), Some(&1));
    assert_eq!(report.skipped.get("unknown_camera"), Some(&1));
    assert_eq!(report.skipped.get("bad_path"), Some(&1));

    let events = all_events(&catalog).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].identity().as_str(), "porch/manual");
    assert_eq!(events[0].timestamp, Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap());
}

#[tokio::test]
async fn scan_of_one_camera_stays_under_its_prefix() {
    let storage = StorageService::memory();
    let catalog = CatalogIndex::memory();
    let engine = engine_with(storage.clone(), catalog.clone());

    put_recording(&storage, "garage/20240101080000.mp4", &[("duration", "1s")]).await;
    put_recording(&storage, "porch/20240101080000.mp4", &[("duration", "1s")]).await;

    let report = engine.scan(Some("porch")).await.unwrap();
    assert_eq!(report.listed, 1);
    assert_eq!(report.added, 1);
    assert_eq!(all_events(&catalog).await[0].camera, "porch");
}

#[tokio::test]
async fn scan_of_unknown_camera_fails() {
    let storage = StorageService::memory();
    let engine = engine_with(storage.clone(), CatalogIndex::memory());
    put_recording(&storage, "attic/20240101080000.mp4", &[("duration", "1s")]).await;

    let err = engine.scan(Some("attic")).await.unwrap_err();
    assert!(matches!(err, Error::CameraNotFound { ref camera } if camera == "attic"));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn scan_commits_in_batches_of_at_most_500() {
    let storage = StorageService::memory();
    let catalog = CatalogIndex::memory();
    let engine = engine_with(storage.clone(), catalog.clone());

    for stem in stems(1200) {
        put_recording(&storage, &format!("garage/{stem}.mp4"), &[("duration", "2s")]).await;
    }

    let report = engine.scan(Some("garage")).await.unwrap();
    assert_eq!(report.added, 1200);
    assert_eq!(report.batches, 3);
    assert_eq!(all_events(&catalog).await.len(), 1200);
}

#[tokio::test]
async fn oversized_batch_setting_is_clamped() {
    let storage = StorageService::memory();
    let catalog = CatalogIndex::memory();
    let settings = EngineConfig {
        batch_size: 1000,
        ..Default::default()
    };
    let engine = Engine::builder(storage.clone(), catalog.clone(), cameras())
        .settings(settings)
        .build();
    assert_eq!(engine.settings().batch_size, 500);

    for stem in stems(600) {
        put_recording(&storage, &format!("garage/{stem}.mp4"), &[("duration", "2s")]).await;
    }

    let report = engine.scan(None).await.unwrap();
    assert_eq!(report.added, 600);
    assert_eq!(report.batches, 2);
    assert_eq!(all_events(&catalog).await.len(), 600);
}

#[tokio::test]
async fn scan_reports_failed_batch_and_keeps_committed_ones() {
    let storage = StorageService::memory();
    let names = stems(1200);
    for stem in &names {
        put_recording(&storage, &format!("garage/{stem}.mp4"), &[("duration", "2s")]).await;
    }

    // The 600th recording lands in the second batch.
    let backend = MemoryCatalogBackend::new();
    let catalog = CatalogIndex::custom(PoisonedCatalog {
        inner: backend.clone(),
        poison: EventKey::new("garage", &names[600]),
    });
    let engine = engine_with(storage, catalog);

    let err = engine.scan(None).await.unwrap_err();
    assert!(matches!(err, Error::Catalog(_)), "unexpected error: {err}");
    assert_eq!(backend.len(), 700);
}

#[tokio::test]
async fn scan_all_enqueues_every_camera() {
    let engine = engine_with(StorageService::memory(), CatalogIndex::memory());
    let trigger = RecordingTrigger::default();

    let count = engine.scan_all(&trigger).await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        *trigger.requests.lock(),
        vec!["garage".to_string(), "porch".to_string()]
    );
}

// =============================================================================
// Retention
// =============================================================================

#[tokio::test]
async fn expunge_removes_events_and_blobs_past_retention() {
    let storage = StorageService::memory();
    let catalog = CatalogIndex::memory();
    let engine = engine_with(storage.clone(), catalog.clone());
    let now: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let events = vec![
        Event::new("garage", "old", now - TimeDelta::days(31), Duration::from_secs(5)),
        Event::new("garage", "edge", now - TimeDelta::days(30), Duration::from_secs(5)),
        Event::new("porch", "recent", now - TimeDelta::days(29), Duration::from_secs(5)),
    ];
    catalog.put_batch(events).await.unwrap();
    for path in [
        "garage/old.jpg",
        "garage/old.mp4",
        "garage/old.avi",
        "garage/edge.jpg",
        "porch/recent.jpg",
        "porch/recent.mp4",
    ] {
        put_blob(&storage, path).await;
    }

    let report = engine.expunge_at(now).await.unwrap();
    assert_eq!(report.scheduled, 2);
    assert_eq!(report.expunged, 2);
    assert_eq!(report.blobs_deleted, 4);
    assert_eq!(report.blob_failures, 0);

    let remaining = all_events(&catalog).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].identity().as_str(), "porch/recent");

    let objects: Vec<String> = storage
        .list_objects(None)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.path)
        .collect();
    assert_eq!(objects, vec!["porch/recent.jpg", "porch/recent.mp4"]);
}

#[tokio::test]
async fn expunge_pages_through_large_backlogs() {
    let catalog = CatalogIndex::memory();
    let settings = EngineConfig {
        page_size: 7,
        ..Default::default()
    };
    let engine = Engine::builder(StorageService::memory(), catalog.clone(), cameras())
        .settings(settings)
        .build();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let events = (0..50)
        .map(|i| {
            Event::new(
                "garage",
                format!("e{i:03}"),
                now - TimeDelta::days(40) + TimeDelta::minutes(i),
                Duration::from_secs(1),
            )
        })
        .collect();
    catalog.put_batch(events).await.unwrap();

    let report = engine.expunge_at(now).await.unwrap();
    assert_eq!(report.expunged, 50);
    assert!(all_events(&catalog).await.is_empty());
}

#[tokio::test]
async fn expunge_stops_on_failed_catalog_delete() {
    let storage = StorageService::memory();
    let backend = MemoryCatalogBackend::new();
    let catalog = CatalogIndex::custom(PoisonedCatalog {
        inner: backend.clone(),
        poison: EventKey::new("garage", "b"),
    });
    let engine = engine_with(storage.clone(), catalog);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let events = ["a", "b", "c"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            Event::new(
                "garage",
                *name,
                now - TimeDelta::days(40) + TimeDelta::hours(i as i64),
                Duration::from_secs(1),
            )
        })
        .collect();
    backend.put_batch(events).await.unwrap();
    for path in ["garage/a.jpg", "garage/b.jpg", "garage/c.jpg"] {
        put_blob(&storage, path).await;
    }

    let err = engine.expunge_at(now).await.unwrap_err();
    assert!(matches!(err, Error::Catalog(_)), "unexpected error: {err}");

    // Tasks already running finish; only the rejected event stays indexed.
    let remaining: Vec<EventKey> = backend.keys(None).await.unwrap().into_iter().collect();
    assert_eq!(remaining, vec![EventKey::new("garage", "b")]);
    assert!(storage.list_objects(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn expunge_tolerates_failed_blob_deletes() {
    let memory = MemoryStorageBackend::new();
    let storage = FaultyStorage::service(&memory, &["garage/old.mp4"]);
    let catalog = CatalogIndex::memory();
    let engine = engine_with(storage.clone(), catalog.clone());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    catalog
        .put_batch(vec![Event::new(
            "garage",
            "old",
            now - TimeDelta::days(45),
            Duration::from_secs(5),
        )])
        .await
        .unwrap();
    put_blob(&storage, "garage/old.jpg").await;
    put_blob(&storage, "garage/old.mp4").await;

    let report = engine.expunge_at(now).await.unwrap();
    assert_eq!(report.expunged, 1);
    assert_eq!(report.blobs_deleted, 1);
    assert_eq!(report.blob_failures, 1);
    assert!(all_events(&catalog).await.is_empty());
    assert!(storage.head_object("garage/old.mp4").await.unwrap().is_some());
    assert!(storage.head_object("garage/old.jpg").await.unwrap().is_none());
}

#[tokio::test]
async fn expunge_rejects_unrepresentable_retention() {
    let catalog = CatalogIndex::memory();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    catalog
        .put_batch(vec![Event::new("garage", "old", now - TimeDelta::days(45), Duration::from_secs(5))])
        .await
        .unwrap();

    // Out of range for a time delta, then in range but past the calendar.
    for retention_days in [u32::MAX, 100_000_000] {
        let settings = EngineConfig {
            retention_days,
            ..Default::default()
        };
        let engine = Engine::builder(StorageService::memory(), catalog.clone(), cameras())
            .settings(settings)
            .build();

        let err = engine.expunge_at(now).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)), "unexpected error: {err}");
    }
    assert_eq!(all_events(&catalog).await.len(), 1);
}

// =============================================================================
// Snapshots
// =============================================================================

async fn put_snapshot(storage: &StorageService, path: &str, captured: DateTime<Utc>) {
    storage
        .put_object(
            path,
            b"jpeg",
            Some("image/jpeg"),
            meta(&[("captured", &captured.to_rfc3339())]),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn snapshot_sweep_prunes_and_reports_stale_cameras() {
    let storage = StorageService::memory();
    let notifier = RecordingNotifier::default();
    let engine = Engine::builder(storage.clone(), CatalogIndex::memory(), cameras())
        .notifier(notifier.clone())
        .notify_config(NotifyConfig {
            recipients: vec!["ops@example.com".to_string()],
            ..Default::default()
        })
        .build();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    put_snapshot(&storage, "__snaps/garage/a.jpg", now - TimeDelta::hours(2)).await;
    put_snapshot(&storage, "__snaps/garage/b.jpg", now - TimeDelta::minutes(30)).await;
    put_snapshot(&storage, "__snaps/porch/c.jpg", now - TimeDelta::minutes(5)).await;
    put_snapshot(&storage, "__snaps/stray.jpg", now).await;

    let report = engine.sweep_snapshots_at(now).await.unwrap();
    assert_eq!(report.listed, 4);
    assert_eq!(report.scheduled, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.stale.len(), 1);
    assert_eq!(report.stale[0].camera, "garage");
    assert!(report.notified);

    assert!(storage.head_object("__snaps/garage/a.jpg").await.unwrap().is_none());
    assert!(storage.head_object("__snaps/garage/b.jpg").await.unwrap().is_some());

    let sent = notifier.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Camera Not Snapshotting");
    assert_eq!(sent[0].recipients, vec!["ops@example.com".to_string()]);
    assert!(sent[0].body.contains("Garage"));
    assert!(!sent[0].body.contains("Front Porch"));
}

#[tokio::test]
async fn snapshot_delete_failure_is_returned_after_notifying() {
    let memory = MemoryStorageBackend::new();
    let storage = FaultyStorage::service(&memory, &["__snaps/garage/a.jpg"]);
    let notifier = RecordingNotifier::default();
    let engine = Engine::builder(storage.clone(), CatalogIndex::memory(), cameras())
        .notifier(notifier.clone())
        .build();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    put_snapshot(&storage, "__snaps/garage/a.jpg", now - TimeDelta::hours(2)).await;
    put_snapshot(&storage, "__snaps/garage/b.jpg", now - TimeDelta::minutes(90)).await;
    put_snapshot(&storage, "__snaps/porch/c.jpg", now - TimeDelta::minutes(5)).await;

    let err = engine.sweep_snapshots_at(now).await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)), "unexpected error: {err}");

    // The sibling delete completed and the stale camera was still reported.
    assert!(storage.head_object("__snaps/garage/a.jpg").await.unwrap().is_some());
    assert!(storage.head_object("__snaps/garage/b.jpg").await.unwrap().is_none());
    assert!(storage.head_object("__snaps/porch/c.jpg").await.unwrap().is_some());

    let sent = notifier.sent.lock();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("Garage"));
}

#[tokio::test]
async fn snapshot_sweep_rejects_unrepresentable_age() {
    let storage = StorageService::memory();
    let settings = EngineConfig {
        snapshot_max_age_mins: u64::MAX,
        ..Default::default()
    };
    let engine = Engine::builder(storage.clone(), CatalogIndex::memory(), cameras())
        .settings(settings)
        .build();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    put_snapshot(&storage, "__snaps/garage/a.jpg", now - TimeDelta::minutes(1)).await;

    let err = engine.sweep_snapshots_at(now).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)), "unexpected error: {err}");
    assert!(storage.head_object("__snaps/garage/a.jpg").await.unwrap().is_some());
}

#[tokio::test]
async fn snapshot_sweep_survives_notifier_failure() {
    let storage = StorageService::memory();
    let engine = Engine::builder(storage.clone(), CatalogIndex::memory(), cameras())
        .notifier(FailingNotifier)
        .build();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    put_snapshot(&storage, "__snaps/porch/c.jpg", now - TimeDelta::minutes(40)).await;

    let report = engine.sweep_snapshots_at(now).await.unwrap();
    assert_eq!(report.stale.len(), 1);
    assert!(!report.notified);
}

#[tokio::test]
async fn snapshot_sweep_without_stale_cameras_sends_nothing() {
    let storage = StorageService::memory();
    let notifier = RecordingNotifier::default();
    let engine = Engine::builder(storage.clone(), CatalogIndex::memory(), cameras())
        .notifier(notifier.clone())
        .build();
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    put_snapshot(&storage, "__snaps/garage/a.jpg", now - TimeDelta::minutes(1)).await;

    let report = engine.sweep_snapshots_at(now).await.unwrap();
    assert!(report.stale.is_empty());
    assert!(notifier.sent.lock().is_empty());
}

// =============================================================================
// Backfill
// =============================================================================

#[tokio::test]
async fn backfill_makes_recordings_indexable() {
    let storage = StorageService::memory();
    let catalog = CatalogIndex::memory();
    let engine = Engine::builder(storage.clone(), catalog.clone(), cameras())
        .prober(FixedProber(Duration::from_secs(42)))
        .build();

    put_recording(&storage, "garage/20240101080000.mp4", &[("motion", "low")]).await;
    put_recording(&storage, "garage/20240101090000-corrupt.mp4", &[]).await;
    put_recording(&storage, "porch/20240101080000.mp4", &[("duration", "9s")]).await;

    assert_eq!(engine.scan(None).await.unwrap().added, 1);

    let report = engine.backfill_durations(None).await.unwrap();
    assert_eq!(report.candidates, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 1);

    let head = storage
        .head_object("garage/20240101080000.mp4")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(head.metadata.get("duration").map(String::as_str), Some("42s"));
    assert_eq!(head.metadata.get("motion").map(String::as_str), Some("low"));

    let rescan = engine.scan(None).await.unwrap();
    assert_eq!(rescan.added, 1);
    let garage = catalog
        .get(&EventKey::new("garage", "20240101080000"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(garage.duration, Duration::from_secs(42));
}

// =============================================================================
// Deadlines
// =============================================================================

#[tokio::test]
async fn bounded_operation_reports_deadline() {
    let settings = EngineConfig {
        operation_timeout_secs: 0,
        ..Default::default()
    };
    let engine = Engine::builder(StorageService::memory(), CatalogIndex::memory(), cameras())
        .settings(settings)
        .build();

    let err = engine
        .bounded("slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DeadlineExceeded { .. }));
    assert_eq!(err.status_code(), 504);
}

#[tokio::test]
async fn newest_first_listing_pages_with_cursor() {
    let catalog = CatalogIndex::memory();
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let events = (0..5)
        .map(|i| Event::new("garage", format!("e{i}"), base + TimeDelta::hours(i), Duration::from_secs(1)))
        .collect();
    catalog.put_batch(events).await.unwrap();

    let query = EventQuery::new(2).order(EventOrder::Newest);
    let first = catalog.query(&query).await.unwrap();
    assert_eq!(first.events[0].filename, "e4");
    let second = catalog
        .query(&query.clone().after(first.cursor))
        .await
        .unwrap();
    assert_eq!(second.events[0].filename, "e2");
    assert_eq!(second.events[1].filename, "e1");
}
