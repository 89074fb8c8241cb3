//! Default values shared across configuration, engine and services.

use std::time::Duration;

/// Default HTTP port for the batch endpoints.
pub const DEFAULT_PORT: u16 = 9920;

/// Content type of a completed recording (the only type the scan indexes).
pub const RECORDING_CONTENT_TYPE: &str = "video/mp4";

/// Hard cap on entries per catalog batch commit.
pub const MAX_BATCH_SIZE: usize = 500;

/// Default page size when walking the catalog.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Default page size when listing the object store.
pub const DEFAULT_LIST_PAGE_SIZE: usize = 1000;

/// Maximum simultaneous blob deletions.
pub const DEFAULT_DELETE_CONCURRENCY: usize = 10;

/// Maximum simultaneous duration probes during backfill.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 8;

/// Events older than this many days are expunged.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Upper bound accepted for `engine.retention_days` (100 years).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Object-store prefix holding periodic snapshots.
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "__snaps";

/// Snapshots older than this are deleted.
pub const DEFAULT_SNAPSHOT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Cameras whose newest snapshot is older than this are reported.
pub const DEFAULT_SNAPSHOT_WARNING_AGE: Duration = Duration::from_secs(25 * 60);

/// Upper bound accepted for the snapshot deletion and warning ages, in minutes.
pub const MAX_SNAPSHOT_AGE_MINS: u64 = 30 * 24 * 60;

/// Camera directory cache lifetime.
pub const DEFAULT_CAMERA_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a single batch operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Time zone used to interpret timestamps embedded in filenames.
pub const DEFAULT_TIMEZONE: &str = "US/Pacific";

/// Blob variants stored alongside every event.
pub const DEFAULT_BLOB_EXTENSIONS: &[&str] = &["jpg", "mp4", "avi"];

/// Header carrying the upload-notification shared secret.
pub const AUTH_HEADER: &str = "x-clipkeep-auth";

/// Reserved object metadata keys (everything else becomes event metadata).
pub const META_CAMERA: &str = "camera";
pub const META_CAPTURED: &str = "captured";
pub const META_DURATION: &str = "duration";

/// Page size of the recent-events listing.
pub const RECENT_EVENTS_LIMIT: usize = 100;
