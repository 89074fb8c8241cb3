//! clipkeep command-line entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clipkeep::engine::{Engine, ScanQueue, ScanTrigger};
use clipkeep::http::{self, AppState};
use clipkeep::{Config, scheduler};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "clipkeep")]
#[command(version, about = "Reconciliation and retention daemon for camera media")]
struct Cli {
    /// Config file (defaults to ~/.clipkeep/clipkeep.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server, scan queue and scheduled jobs
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Index new recordings once
    Scan {
        /// Restrict to one camera
        #[arg(long)]
        camera: Option<String>,
    },
    /// Scan every known camera, one at a time
    ScanAll,
    /// Remove events past the retention horizon
    Expunge,
    /// Prune snapshots and report silent cameras
    Snapshots,
    /// Probe recordings that are missing a duration
    Backfill {
        /// Restrict to one camera
        #[arg(long)]
        camera: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load_or_default(cli.config.as_deref())?;
    let engine = Engine::from_config(&config)?;

    match cli.command {
        Command::Serve { port } => serve(engine, &config, port).await,
        Command::Scan { camera } => {
            let report = engine
                .bounded("scan", engine.scan(camera.as_deref()))
                .await?;
            println!(
                "Listed {} objects, added {} events in {} batches ({} already indexed)",
                report.listed, report.added, report.batches, report.already_indexed
            );
            for (reason, count) in &report.skipped {
                println!("  skipped {count} ({reason})");
            }
            Ok(())
        },
        Command::ScanAll => {
            let (queue, worker) = ScanQueue::start(engine.clone());
            let count = engine.scan_all(&queue).await?;
            drop(queue);
            worker.await.context("Scan worker failed")?;
            println!("Scanned {count} cameras");
            Ok(())
        },
        Command::Expunge => {
            let report = engine.bounded("expunge", engine.expunge()).await?;
            println!(
                "Expunged {} of {} events ({} blobs deleted, {} blob failures)",
                report.expunged, report.scheduled, report.blobs_deleted, report.blob_failures
            );
            Ok(())
        },
        Command::Snapshots => {
            let report = engine
                .bounded("snapshots", engine.sweep_snapshots())
                .await?;
            println!(
                "Deleted {} of {} snapshots",
                report.deleted, report.listed
            );
            for stale in &report.stale {
                println!("  {} last seen {}", stale.camera, stale.last_seen);
            }
            Ok(())
        },
        Command::Backfill { camera } => {
            let report = engine
                .bounded("backfill", engine.backfill_durations(camera.as_deref()))
                .await?;
            println!(
                "Updated {} of {} recordings ({} failed)",
                report.updated, report.candidates, report.failed
            );
            Ok(())
        },
    }
}

async fn serve(engine: Engine, config: &Config, port: Option<u16>) -> Result<()> {
    let (queue, worker) = ScanQueue::start(engine.clone());
    let trigger: Arc<dyn ScanTrigger> = Arc::new(queue.clone());

    let mut jobs = scheduler::start(engine.clone(), Arc::clone(&trigger), &config.schedules).await?;

    let state = AppState::new(engine, queue, config.server.auth_token.clone());
    if state.auth_token.is_none() {
        tracing::warn!("server.auth_token is not set, upload notifications are unauthenticated");
    }
    let app = http::router(state);

    let addr = format!("{}:{}", config.server.bind, port.unwrap_or(config.server.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "clipkeep listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutting down");
    if let Err(e) = jobs.shutdown().await {
        tracing::warn!(error = %e, "Scheduler did not shut down cleanly");
    }
    drop(trigger);
    worker.abort();
    Ok(())
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
