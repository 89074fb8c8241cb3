//! The reconciliation and retention engine.
//!
//! [`Engine`] owns handles to every collaborator and exposes the batch
//! operations:
//!
//! - [`Engine::scan`] - index new recordings ([`reconcile`])
//! - [`Engine::scan_all`] - fan a scan out per camera ([`trigger`])
//! - [`Engine::expunge`] - enforce the retention horizon ([`retention`])
//! - [`Engine::sweep_snapshots`] - prune snapshots, report silent cameras ([`snapshots`])
//! - [`Engine::backfill_durations`] - probe recordings missing a duration ([`backfill`])
//!
//! Each invocation builds its own working state; the camera directory and
//! the delete permit pool are the only state shared between invocations.

pub mod backfill;
pub mod classify;
pub mod reconcile;
pub mod retention;
pub mod snapshots;
pub mod taskgroup;
pub mod trigger;

use crate::config::{CatalogBackendKind, Config, EngineConfig, NotifyConfig, NotifyTransport, StorageBackendKind};
use crate::constants::MAX_BATCH_SIZE;
use crate::error::{Error, Result};
use crate::services::cameras::{CameraDirectory, StaticCameraSource};
use crate::services::catalog::CatalogIndex;
use crate::services::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::services::storage::StorageService;
use anyhow::Context;
use backfill::{DurationProber, FfprobeProber};
use classify::{CaptureZone, Classifier};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub use backfill::BackfillReport;
pub use reconcile::ScanReport;
pub use retention::ExpungeReport;
pub use snapshots::{SnapshotReport, StaleCamera};
pub use trigger::{ScanQueue, ScanTrigger};

/// Handle to the engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    storage: StorageService,
    catalog: CatalogIndex,
    cameras: CameraDirectory,
    notifier: Arc<dyn Notifier>,
    prober: Arc<dyn DurationProber>,
    classifier: Classifier,
    settings: Arc<EngineConfig>,
    notify: Arc<NotifyConfig>,
    delete_permits: Arc<Semaphore>,
}

impl Engine {
    pub fn builder(
        storage: StorageService,
        catalog: CatalogIndex,
        cameras: CameraDirectory,
    ) -> EngineBuilder {
        EngineBuilder {
            storage,
            catalog,
            cameras,
            notifier: Arc::new(LogNotifier),
            prober: None,
            settings: EngineConfig::default(),
            notify: NotifyConfig::default(),
        }
    }

    /// Wire the engine from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend cannot be opened.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let storage = match config.storage.backend {
            StorageBackendKind::Filesystem => StorageService::file(config.storage_dir()?)
                .context("Failed to open object store")?,
            StorageBackendKind::Memory => StorageService::memory(),
        };
        let catalog = match config.catalog.backend {
            CatalogBackendKind::Redb => {
                CatalogIndex::file(config.catalog_path()?).context("Failed to open catalog")?
            },
            CatalogBackendKind::Memory => CatalogIndex::memory(),
        };
        let cameras = CameraDirectory::new(
            StaticCameraSource::from_entries(&config.cameras.entries),
            Duration::from_secs(config.cameras.cache_ttl_secs),
        );

        let mut builder = Self::builder(storage, catalog, cameras)
            .settings(config.engine.clone())
            .notify_config(config.notify.clone());
        if config.notify.transport == NotifyTransport::Webhook
            && let Some(url) = &config.notify.url
        {
            builder = builder.notifier(WebhookNotifier::new(url.clone())?);
        }

        Ok(builder.build())
    }

    pub fn storage(&self) -> &StorageService {
        &self.storage
    }

    pub fn catalog(&self) -> &CatalogIndex {
        &self.catalog
    }

    pub fn cameras(&self) -> &CameraDirectory {
        &self.cameras
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Run `operation` under the configured operation timeout.
    ///
    /// # Errors
    ///
    /// The operation's own error, or [`Error::DeadlineExceeded`].
    pub async fn bounded<T, F>(&self, name: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.settings.operation_timeout();
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(operation = name, timeout_secs = timeout.as_secs(), "Operation deadline exceeded");
                Err(Error::deadline_exceeded(name, timeout.as_secs()))
            },
        }
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    storage: StorageService,
    catalog: CatalogIndex,
    cameras: CameraDirectory,
    notifier: Arc<dyn Notifier>,
    prober: Option<Arc<dyn DurationProber>>,
    settings: EngineConfig,
    notify: NotifyConfig,
}

impl EngineBuilder {
    #[must_use]
    pub fn settings(mut self, settings: EngineConfig) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn notify_config(mut self, notify: NotifyConfig) -> Self {
        self.notify = notify;
        self
    }

    #[must_use]
    pub fn notifier<N: Notifier>(mut self, notifier: N) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    #[must_use]
    pub fn prober<P: DurationProber>(mut self, prober: P) -> Self {
        self.prober = Some(Arc::new(prober));
        self
    }

    /// Finish the engine. A batch size outside `1..=500` is clamped so every
    /// commit stays within the catalog's limit.
    pub fn build(self) -> Engine {
        let mut settings = self.settings;
        let batch_size = settings.batch_size.clamp(1, MAX_BATCH_SIZE);
        if batch_size != settings.batch_size {
            tracing::warn!(
                requested = settings.batch_size,
                batch_size,
                "Batch size out of range, clamping"
            );
            settings.batch_size = batch_size;
        }
        let classifier = Classifier::new(
            CaptureZone::resolve(&settings.timezone),
            settings.recording_content_type.clone(),
        );
        let prober = self
            .prober
            .unwrap_or_else(|| Arc::new(FfprobeProber::new(settings.ffprobe.clone())));

        Engine {
            storage: self.storage,
            catalog: self.catalog,
            cameras: self.cameras,
            notifier: self.notifier,
            prober,
            classifier,
            delete_permits: Arc::new(Semaphore::new(settings.delete_concurrency.max(1))),
            settings: Arc::new(settings),
            notify: Arc::new(self.notify),
        }
    }
}
