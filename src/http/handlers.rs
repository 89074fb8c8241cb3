//! Route handlers.

use super::types::{
    CameraView, EventListParams, EventListResponse, NewFileParams, ScanParams,
};
use super::{AppError, AppState};
use crate::constants::{AUTH_HEADER, RECENT_EVENTS_LIMIT};
use crate::error::Error;
use crate::services::catalog::{Cursor, EventOrder, EventQuery};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use subtle::ConstantTimeEq;

/// GET /health
pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /batch/scan - Index new recordings, optionally for one camera.
pub(crate) async fn batch_scan(
    State(state): State<AppState>,
    Query(params): Query<ScanParams>,
) -> Result<StatusCode, AppError> {
    let engine = &state.engine;
    let report = engine
        .bounded("scan", engine.scan(params.camera.as_deref()))
        .await?;
    tracing::info!(
        camera = params.camera.as_deref().unwrap_or("*"),
        added = report.added,
        batches = report.batches,
        "Scan finished"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// POST /batch/scan-all - Enqueue one scan per known camera.
pub(crate) async fn batch_scan_all(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let engine = &state.engine;
    engine
        .bounded("scan-all", engine.scan_all(&*state.trigger))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /batch/snapshots - Prune snapshots and report silent cameras.
pub(crate) async fn batch_snapshots(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let engine = &state.engine;
    let report = engine
        .bounded("snapshots", engine.sweep_snapshots())
        .await?;
    tracing::info!(
        deleted = report.deleted,
        stale = report.stale.len(),
        "Snapshot sweep finished"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// POST /batch/expunge - Enforce the retention horizon.
pub(crate) async fn batch_expunge(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let engine = &state.engine;
    let report = engine.bounded("expunge", engine.expunge()).await?;
    tracing::info!(
        expunged = report.expunged,
        blob_failures = report.blob_failures,
        "Expunge finished"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// POST /batch/backfill - Probe recordings missing a duration.
pub(crate) async fn batch_backfill(
    State(state): State<AppState>,
    Query(params): Query<ScanParams>,
) -> Result<StatusCode, AppError> {
    let engine = &state.engine;
    let report = engine
        .bounded("backfill", engine.backfill_durations(params.camera.as_deref()))
        .await?;
    tracing::info!(
        candidates = report.candidates,
        updated = report.updated,
        failed = report.failed,
        "Backfill finished"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/newfile?cam= - Upload hook.
///
/// The scan runs in the background; a rejected enqueue is only logged.
pub(crate) async fn new_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<NewFileParams>,
) -> Result<StatusCode, AppError> {
    if let Some(expected) = state.auth_token.as_deref() {
        let provided = headers
            .get(AUTH_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();
        if !bool::from(provided.ct_eq(expected.as_bytes())) {
            return Err(Error::Unauthorized.into());
        }
    }

    let Some(camera) = params.cam.filter(|c| !c.is_empty()) else {
        return Ok(StatusCode::BAD_REQUEST);
    };
    if let Err(e) = state.trigger.request_scan(&camera).await {
        tracing::error!(camera = %camera, error = %e, "Failed to enqueue scan");
    }
    Ok(StatusCode::CREATED)
}

/// GET /api/events?cam=&cursor= - Recent events, newest first.
///
/// An unknown camera is ignored rather than rejected.
pub(crate) async fn recent_events(
    State(state): State<AppState>,
    Query(params): Query<EventListParams>,
) -> Result<Json<EventListResponse>, AppError> {
    let engine = &state.engine;
    let mut query = EventQuery::new(RECENT_EVENTS_LIMIT)
        .order(EventOrder::Newest)
        .after(params.cursor.map(Cursor::from));

    if let Some(cam) = params.cam.as_deref()
        && engine.cameras().get(cam).await?.is_some()
    {
        query = query.camera(cam);
    }

    let page = engine.catalog().query(&query).await?;
    Ok(Json(EventListResponse::from_page(
        &page,
        engine.classifier().zone(),
    )))
}

/// GET /api/cams - Known cameras, sorted by id.
pub(crate) async fn list_cameras(
    State(state): State<AppState>,
) -> Result<Json<Vec<CameraView>>, AppError> {
    let cameras = state.engine.cameras().cameras().await?;
    let mut views: Vec<CameraView> = cameras.values().map(CameraView::from).collect();
    views.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(views))
}
