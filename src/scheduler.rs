//! Periodic batch jobs.
//!
//! Each configured cron expression (6 fields, seconds first) runs one engine
//! operation under the operation deadline. Failures are logged; the next
//! tick runs regardless.

use crate::config::SchedulesConfig;
use crate::engine::{Engine, ScanTrigger};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Batch operations that can run on a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchJob {
    ScanAll,
    Snapshots,
    Expunge,
    Backfill,
}

impl BatchJob {
    pub fn name(self) -> &'static str {
        match self {
            Self::ScanAll => "scan-all",
            Self::Snapshots => "snapshots",
            Self::Expunge => "expunge",
            Self::Backfill => "backfill",
        }
    }

    /// Run the job once and log its outcome.
    pub async fn run(self, engine: &Engine, trigger: &dyn ScanTrigger) {
        let name = self.name();
        let outcome = match self {
            Self::ScanAll => engine
                .bounded(name, engine.scan_all(trigger))
                .await
                .map(|count| format!("enqueued {count} scans")),
            Self::Snapshots => engine
                .bounded(name, engine.sweep_snapshots())
                .await
                .map(|r| format!("deleted {} snapshots, {} stale cameras", r.deleted, r.stale.len())),
            Self::Expunge => engine
                .bounded(name, engine.expunge())
                .await
                .map(|r| format!("expunged {} events", r.expunged)),
            Self::Backfill => engine
                .bounded(name, engine.backfill_durations(None))
                .await
                .map(|r| format!("updated {} of {} recordings", r.updated, r.candidates)),
        };
        match outcome {
            Ok(summary) => tracing::info!(job = name, summary = %summary, "Scheduled job finished"),
            Err(e) => tracing::error!(job = name, error = %e, "Scheduled job failed"),
        }
    }
}

/// The configured jobs paired with their cron expressions.
pub fn configured_jobs(schedules: &SchedulesConfig) -> Vec<(BatchJob, String)> {
    [
        (BatchJob::ScanAll, &schedules.scan_all),
        (BatchJob::Snapshots, &schedules.snapshots),
        (BatchJob::Expunge, &schedules.expunge),
        (BatchJob::Backfill, &schedules.backfill),
    ]
    .into_iter()
    .filter_map(|(job, cron)| cron.clone().map(|c| (job, c)))
    .collect()
}

/// Register every configured job and start the scheduler.
///
/// # Errors
///
/// Returns an error if a cron expression is invalid or the scheduler fails
/// to start.
pub async fn start(
    engine: Engine,
    trigger: Arc<dyn ScanTrigger>,
    schedules: &SchedulesConfig,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new()
        .await
        .context("Failed to create job scheduler")?;

    for (job, cron) in configured_jobs(schedules) {
        let engine = engine.clone();
        let trigger = Arc::clone(&trigger);
        let task = Job::new_async(cron.as_str(), move |_id, _scheduler| {
            let engine = engine.clone();
            let trigger = Arc::clone(&trigger);
            Box::pin(async move {
                job.run(&engine, trigger.as_ref()).await;
            })
        })
        .with_context(|| format!("Invalid cron expression for {}: {cron}", job.name()))?;

        scheduler
            .add(task)
            .await
            .with_context(|| format!("Failed to schedule {}", job.name()))?;
        tracing::info!(job = job.name(), cron = %cron, "Scheduled batch job");
    }

    scheduler
        .start()
        .await
        .context("Failed to start job scheduler")?;
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cameras::{Camera, CameraDirectory};
    use crate::services::catalog::CatalogIndex;
    use crate::services::storage::StorageService;
    use async_trait::async_trait;
    use parking_lot::Mutex;

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

    #[test]
    fn test_configured_jobs_skips_unset() {
        let schedules = SchedulesConfig {
            scan_all: Some("0 */5 * * * *".to_string()),
            expunge: Some("0 0 3 * * *".to_string()),
            ..Default::default()
        };
        let jobs = configured_jobs(&schedules);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].0, BatchJob::ScanAll);
        assert_eq!(jobs[1], (BatchJob::Expunge, "0 0 3 * * *".to_string()));
    }

    #[tokio::test]
    async fn test_scan_all_job_fans_out() {
        let cameras = CameraDirectory::fixed([Camera::new("b", ""), Camera::new("a", "")]);
        let engine =
            Engine::builder(StorageService::memory(), CatalogIndex::memory(), cameras).build();
        let trigger = RecordingTrigger::default();

        BatchJob::ScanAll.run(&engine, &trigger).await;

        assert_eq!(*trigger.requests.lock(), vec!["a".to_string(), "b".to_string()]);
    }
}
