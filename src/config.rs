//! Configuration types for the clipkeep daemon.
//!
//! Loaded from a TOML file (by default `~/.clipkeep/clipkeep.toml`). Every
//! section is optional and falls back to the defaults in [`crate::constants`],
//! so an empty file is a valid configuration.
//!
//! ```toml
//! [engine]
//! timezone = "US/Pacific"
//! retention_days = 30
//!
//! [[cameras.entries]]
//! id = "basement"
//! name = "Basement"
//!
//! [notify]
//! transport = "webhook"
//! url = "https://hooks.example.com/cams"
//! recipients = ["ops@example.com"]
//!
//! [schedules]
//! scan_all = "0 */15 * * * *"
//! snapshots = "0 */5 * * * *"
//! expunge = "0 0 3 * * *"
//! ```

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub engine: EngineConfig,
    pub cameras: CamerasConfig,
    pub notify: NotifyConfig,
    pub server: ServerConfig,
    pub schedules: SchedulesConfig,
}

/// Object store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Filesystem,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// Root directory for the filesystem backend (default `~/.clipkeep/storage`).
    pub path: Option<PathBuf>,
}

/// Catalog backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackendKind {
    #[default]
    Redb,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub backend: CatalogBackendKind,
    /// Database file for the redb backend (default `~/.clipkeep/catalog.redb`).
    pub path: Option<PathBuf>,
}

/// Tunables for the reconciliation and retention engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// IANA zone used for timestamps embedded in filenames.
    pub timezone: String,
    pub retention_days: u32,
    pub snapshot_prefix: String,
    pub snapshot_max_age_mins: u64,
    pub snapshot_warning_mins: u64,
    pub delete_concurrency: usize,
    pub probe_concurrency: usize,
    pub batch_size: usize,
    pub page_size: usize,
    pub recording_content_type: String,
    pub blob_extensions: Vec<String>,
    pub operation_timeout_secs: u64,
    /// Path to the ffprobe binary used by duration backfill.
    pub ffprobe: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: constants::DEFAULT_TIMEZONE.to_string(),
            retention_days: constants::DEFAULT_RETENTION_DAYS,
            snapshot_prefix: constants::DEFAULT_SNAPSHOT_PREFIX.to_string(),
            snapshot_max_age_mins: constants::DEFAULT_SNAPSHOT_MAX_AGE.as_secs() / 60,
            snapshot_warning_mins: constants::DEFAULT_SNAPSHOT_WARNING_AGE.as_secs() / 60,
            delete_concurrency: constants::DEFAULT_DELETE_CONCURRENCY,
            probe_concurrency: constants::DEFAULT_PROBE_CONCURRENCY,
            batch_size: constants::MAX_BATCH_SIZE,
            page_size: constants::DEFAULT_PAGE_SIZE,
            recording_content_type: constants::RECORDING_CONTENT_TYPE.to_string(),
            blob_extensions: constants::DEFAULT_BLOB_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            operation_timeout_secs: constants::DEFAULT_OPERATION_TIMEOUT.as_secs(),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl EngineConfig {
    /// Retention horizon.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the value is out of range.
    pub fn retention(&self) -> crate::Result<TimeDelta> {
        TimeDelta::try_days(i64::from(self.retention_days)).ok_or_else(|| {
            crate::Error::Config(format!(
                "engine.retention_days out of range: {}",
                self.retention_days
            ))
        })
    }

    /// Snapshots older than this are deleted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the value is out of range.
    pub fn snapshot_max_age(&self) -> crate::Result<TimeDelta> {
        minutes("engine.snapshot_max_age_mins", self.snapshot_max_age_mins)
    }

    /// Cameras silent for longer than this are reported.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the value is out of range.
    pub fn snapshot_warning_age(&self) -> crate::Result<TimeDelta> {
        minutes("engine.snapshot_warning_mins", self.snapshot_warning_mins)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

fn minutes(field: &str, value: u64) -> crate::Result<TimeDelta> {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .ok_or_else(|| crate::Error::Config(format!("{field} out of range: {value}")))
}

/// A camera known to the config-backed directory source.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CamerasConfig {
    pub cache_ttl_secs: u64,
    pub entries: Vec<CameraEntry>,
}

impl Default for CamerasConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: constants::DEFAULT_CAMERA_CACHE_TTL.as_secs(),
            entries: Vec::new(),
        }
    }
}

/// Notification transport selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyTransport {
    #[default]
    Log,
    Webhook,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub transport: NotifyTransport,
    pub url: Option<String>,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            transport: NotifyTransport::Log,
            url: None,
            sender: "clipkeep".to_string(),
            recipients: Vec::new(),
            subject: "Camera Not Snapshotting".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Shared secret expected in the upload-notification header.
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: constants::DEFAULT_PORT,
            auth_token: None,
        }
    }
}

/// Cron expressions (6-field, seconds first) for the periodic batch jobs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedulesConfig {
    pub scan_all: Option<String>,
    pub snapshots: Option<String>,
    pub expunge: Option<String>,
    pub backfill: Option<String>,
}

impl Config {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails [`Config::validate`].
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from the given path, or the default location if it exists, or defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        let default_path = crate::paths::get_config_path()?;
        if default_path.exists() {
            Self::load_from(default_path)
        } else {
            tracing::debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.delete_concurrency == 0 {
            bail!("engine.delete_concurrency must be at least 1");
        }
        if engine.probe_concurrency == 0 {
            bail!("engine.probe_concurrency must be at least 1");
        }
        if engine.batch_size == 0 || engine.batch_size > constants::MAX_BATCH_SIZE {
            bail!(
                "engine.batch_size must be between 1 and {} (got {})",
                constants::MAX_BATCH_SIZE,
                engine.batch_size
            );
        }
        if engine.page_size == 0 {
            bail!("engine.page_size must be at least 1");
        }
        if engine.retention_days == 0 || engine.retention_days > constants::MAX_RETENTION_DAYS {
            bail!(
                "engine.retention_days must be between 1 and {} (got {})",
                constants::MAX_RETENTION_DAYS,
                engine.retention_days
            );
        }
        for (field, value) in [
            ("snapshot_max_age_mins", engine.snapshot_max_age_mins),
            ("snapshot_warning_mins", engine.snapshot_warning_mins),
        ] {
            if value > constants::MAX_SNAPSHOT_AGE_MINS {
                bail!(
                    "engine.{field} must be at most {} (got {value})",
                    constants::MAX_SNAPSHOT_AGE_MINS
                );
            }
        }
        if engine.snapshot_prefix.trim_matches('/').is_empty() {
            bail!("engine.snapshot_prefix cannot be empty");
        }
        if engine.snapshot_warning_mins >= engine.snapshot_max_age_mins {
            bail!(
                "engine.snapshot_warning_mins ({}) must be shorter than engine.snapshot_max_age_mins ({})",
                engine.snapshot_warning_mins,
                engine.snapshot_max_age_mins
            );
        }
        if engine.blob_extensions.is_empty() {
            bail!("engine.blob_extensions cannot be empty");
        }
        if self.notify.transport == NotifyTransport::Webhook && self.notify.url.is_none() {
            bail!("notify.url is required for the webhook transport");
        }
        for camera in &self.cameras.entries {
            if camera.id.is_empty() || camera.id.contains('/') {
                bail!("invalid camera id {:?}", camera.id);
            }
        }
        Ok(())
    }

    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => crate::paths::get_storage_dir(),
        }
    }

    pub fn catalog_path(&self) -> Result<PathBuf> {
        match &self.catalog.path {
            Some(path) => Ok(path.clone()),
            None => crate::paths::get_catalog_path(),
        }
    }
}
