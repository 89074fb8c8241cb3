//! HTTP boundary.
//!
//! Batch endpoints run one engine operation under the operation deadline
//! and answer `204 No Content`. The upload hook enqueues a camera scan and
//! returns immediately. The read endpoints expose recent events and the
//! camera list.

mod handlers;
mod types;

use crate::engine::{Engine, ScanTrigger};
use crate::error::Error;
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;

pub use types::{CameraView, EventListResponse, EventView};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub trigger: Arc<dyn ScanTrigger>,
    /// Expected value of the upload-notification header. `None` disables the check.
    pub auth_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new<T: ScanTrigger>(engine: Engine, trigger: T, auth_token: Option<String>) -> Self {
        Self {
            engine,
            trigger: Arc::new(trigger),
            auth_token: auth_token.map(Into::into),
        }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/batch/scan", post(handlers::batch_scan))
        .route("/batch/scan-all", post(handlers::batch_scan_all))
        .route("/batch/snapshots", post(handlers::batch_snapshots))
        .route("/batch/expunge", post(handlers::batch_expunge))
        .route("/batch/backfill", post(handlers::batch_backfill))
        .route("/api/newfile", post(handlers::new_file))
        .route("/api/events", get(handlers::recent_events))
        .route("/api/cams", get(handlers::list_cameras))
        .with_state(state)
}

/// Engine error carried to the HTTP response.
#[derive(Debug)]
pub struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = self.0.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "Request rejected");
        }

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::AUTH_HEADER;
    use crate::services::cameras::{Camera, CameraDirectory};
    use crate::services::catalog::{CatalogIndex, Event};
    use crate::services::storage::StorageService;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Default, Clone)]
    struct RecordingTrigger {
        requests: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ScanTrigger for RecordingTrigger {
        async fn request_scan(&self, camera: &str) -> anyhow::Result<()> {
            self.requests.lock().push(camera.to_string());
            Ok(())
        }
    }

    fn test_engine() -> Engine {
        let cameras = CameraDirectory::fixed([
            Camera::new("garage", "Garage").with_token("tok-1"),
            Camera::new("porch", ""),
        ]);
        Engine::builder(StorageService::memory(), CatalogIndex::memory(), cameras).build()
    }

    fn test_app(trigger: RecordingTrigger) -> (Router, Engine) {
        let engine = test_engine();
        let state = AppState::new(engine.clone(), trigger, Some("secret".to_string()));
        (router(state), engine)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn seed_events(engine: &Engine) {
        let events = vec![
            Event::new(
                "garage",
                "20240101080000",
                Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap(),
                Duration::from_secs(12),
            ),
            Event::new(
                "porch",
                "20240102080000",
                Utc.with_ymd_and_hms(2024, 1, 2, 16, 0, 0).unwrap(),
                Duration::from_secs(7),
            ),
        ];
        engine.catalog().put_batch(events).await.unwrap();
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app(RecordingTrigger::default());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_new_file_requires_auth() {
        let trigger = RecordingTrigger::default();
        let (app, _) = test_app(trigger.clone());

        let missing = app
            .clone()
            .oneshot(
                Request::post("/api/newfile?cam=garage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .oneshot(
                Request::post("/api/newfile?cam=garage")
                    .header(AUTH_HEADER, "nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert!(trigger.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_new_file_enqueues_scan() {
        let trigger = RecordingTrigger::default();
        let (app, _) = test_app(trigger.clone());

        let response = app
            .oneshot(
                Request::post("/api/newfile?cam=garage")
                    .header(AUTH_HEADER, "secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(*trigger.requests.lock(), vec!["garage".to_string()]);
    }

    #[tokio::test]
    async fn test_batch_scan_unknown_camera_is_not_found() {
        let (app, engine) = test_app(RecordingTrigger::default());
        engine
            .storage()
            .put_object(
                "attic/20240101080000.mp4",
                b"clip",
                Some("video/mp4"),
                Default::default(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::post("/batch/scan?camera=attic")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("attic"));
    }

    #[tokio::test]
    async fn test_batch_endpoints_return_no_content() {
        let trigger = RecordingTrigger::default();
        let (app, _) = test_app(trigger.clone());

        for uri in [
            "/batch/scan",
            "/batch/scan-all",
            "/batch/snapshots",
            "/batch/expunge",
            "/batch/backfill",
        ] {
            let response = app
                .clone()
                .oneshot(Request::post(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT, "{uri}");
        }
        assert_eq!(
            *trigger.requests.lock(),
            vec!["garage".to_string(), "porch".to_string()]
        );
    }

    #[tokio::test]
    async fn test_recent_events_newest_first() {
        let (app, engine) = test_app(RecordingTrigger::default());
        seed_events(&engine).await;

        let response = app
            .oneshot(Request::get("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["camera"], "porch");
        assert_eq!(events[1]["camera"], "garage");
        assert_eq!(events[1]["duration"], "12s");
        assert!(body["cursor"].is_null());
    }

    #[tokio::test]
    async fn test_recent_events_camera_filter() {
        let (app, engine) = test_app(RecordingTrigger::default());
        seed_events(&engine).await;

        let filtered = body_json(
            app.clone()
                .oneshot(Request::get("/api/events?cam=garage").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(filtered["events"].as_array().unwrap().len(), 1);

        // Unknown cameras fall back to the unfiltered listing.
        let unknown = body_json(
            app.oneshot(Request::get("/api/events?cam=attic").body(Body::empty()).unwrap())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(unknown["events"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_recent_events_bad_cursor() {
        let (app, _) = test_app(RecordingTrigger::default());
        let response = app
            .oneshot(
                Request::get("/api/events?cursor=zz-not-hex")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_cameras_hides_tokens() {
        let (app, _) = test_app(RecordingTrigger::default());
        let response = app
            .oneshot(Request::get("/api/cams").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let cams = body.as_array().unwrap();
        assert_eq!(cams.len(), 2);
        assert_eq!(cams[0]["id"], "garage");
        assert_eq!(cams[0]["name"], "Garage");
        assert_eq!(cams[1]["name"], "porch");
        assert!(cams[0].get("token").is_none());
    }
}
