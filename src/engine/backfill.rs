//! Duration backfill for recordings uploaded without a `duration`.
//!
//! The scan treats a recording without a usable duration as incomplete and
//! skips it. Backfill probes such recordings and writes the duration back
//! onto the object so the next scan indexes them.

use super::Engine;
use super::classify::{format_duration, parse_duration};
use super::taskgroup::TaskGroup;
use crate::constants::META_DURATION;
use crate::error::{Error, Result};
use crate::reliability::retry::{RetryConfig, retry_async};
use crate::services::storage::{ObjectMeta, StorageService};
use anyhow::{Context, bail};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Measures the playing time of a media file.
#[async_trait]
pub trait DurationProber: Send + Sync + 'static {
    /// `name` is the object name, used for the file extension and messages.
    async fn probe(&self, name: &str, data: &[u8]) -> anyhow::Result<Duration>;
}

/// Probes with `ffprobe` (or `avprobe`) JSON output.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    program: PathBuf,
}

impl FfprobeProber {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn format_flag(&self) -> &'static str {
        let is_avprobe = self
            .program
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with("avprobe"));
        if is_avprobe { "-of" } else { "-print_format" }
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: String,
}

/// Extract `format.duration` (seconds, decimal) from probe JSON.
fn parse_probe_output(stdout: &[u8]) -> anyhow::Result<Duration> {
    let output: ProbeOutput =
        serde_json::from_slice(stdout).context("Failed to parse probe output")?;
    let seconds = output.format.duration.trim();
    parse_duration(&format!("{seconds}s"))
        .with_context(|| format!("Invalid probe duration: {seconds:?}"))
}

#[async_trait]
impl DurationProber for FfprobeProber {
    async fn probe(&self, name: &str, data: &[u8]) -> anyhow::Result<Duration> {
        let suffix = Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix("clipkeep-probe-")
            .suffix(&suffix)
            .tempfile()
            .context("Failed to create probe file")?;
        tokio::fs::write(file.path(), data)
            .await
            .with_context(|| format!("Failed to stage {name} for probing"))?;

        let output = tokio::process::Command::new(&self.program)
            .args(["-v", "error", self.format_flag(), "json", "-show_format"])
            .arg(file.path())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        parse_probe_output(&output.stdout)
    }
}

/// Outcome of a backfill pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Recordings without a usable duration.
    pub candidates: usize,
    /// Recordings whose duration was written back.
    pub updated: usize,
    /// Recordings that could not be fetched, probed or updated.
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    updated: AtomicUsize,
    failed: AtomicUsize,
}

impl Engine {
    /// Probe every recording under `camera/` (or everywhere) that lacks a
    /// parseable duration and store the result in its metadata.
    ///
    /// Per-object failures are logged and counted, never returned.
    ///
    /// # Errors
    ///
    /// Listing failure, or a probe task that panicked.
    pub async fn backfill_durations(&self, camera: Option<&str>) -> Result<BackfillReport> {
        let prefix = camera.map(|c| format!("{c}/"));
        let permits = Arc::new(Semaphore::new(self.settings.probe_concurrency.max(1)));
        let counters = Arc::new(Counters::default());
        let mut group = TaskGroup::new();
        let mut candidates = 0;

        let mut listing = self.storage.list_stream(prefix.as_deref());
        while let Some(object) = listing.try_next().await.map_err(Error::Storage)? {
            if !self.classifier.is_recording(&object)
                || object
                    .metadata
                    .get(META_DURATION)
                    .and_then(|d| parse_duration(d))
                    .is_some()
            {
                continue;
            }
            candidates += 1;

            let storage = self.storage.clone();
            let prober = Arc::clone(&self.prober);
            let counters = Arc::clone(&counters);
            group.spawn_bounded(&permits, async move {
                let path = object.path.clone();
                match backfill_one(storage, prober, object).await {
                    Ok(duration) => {
                        counters.updated.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(path = %path, duration = %format_duration(duration), "Stored probed duration");
                    },
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %e, "Duration backfill failed");
                    },
                }
                Ok(())
            });
        }

        group.wait().await?;
        let report = BackfillReport {
            candidates,
            updated: counters.updated.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        };
        tracing::info!(
            candidates = report.candidates,
            updated = report.updated,
            failed = report.failed,
            "Duration backfill complete"
        );
        Ok(report)
    }
}

async fn backfill_one(
    storage: StorageService,
    prober: Arc<dyn DurationProber>,
    object: ObjectMeta,
) -> Result<Duration> {
    let probe_error = |source: anyhow::Error| Error::Probe {
        path: object.path.clone(),
        source,
    };

    let (data, current) = storage
        .get_object(&object.path)
        .await
        .map_err(Error::Storage)?
        .ok_or_else(|| probe_error(anyhow::anyhow!("object disappeared")))?;
    let duration = prober
        .probe(&object.path, &data)
        .await
        .map_err(probe_error)?;

    let mut metadata = current.metadata;
    metadata.insert(META_DURATION.to_string(), format_duration(duration));

    retry_async(
        RetryConfig::default(),
        || storage.update_metadata(&object.path, metadata.clone()),
        |_| true,
    )
    .await
    .map_err(Error::Storage)?
    .ok_or_else(|| probe_error(anyhow::anyhow!("object disappeared before update")))?;

    Ok(duration)
}
