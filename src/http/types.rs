//! Request and response bodies.

use crate::engine::classify::{CaptureZone, format_duration};
use crate::services::cameras::Camera;
use crate::services::catalog::{Event, EventPage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScanParams {
    pub camera: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NewFileParams {
    pub cam: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EventListParams {
    pub cam: Option<String>,
    pub cursor: Option<String>,
}

/// One event as shown to clients.
#[derive(Debug, Serialize)]
pub struct EventView {
    pub identity: String,
    pub camera: String,
    pub filename: String,
    pub captured: DateTime<Utc>,
    /// Capture time rendered in the camera time zone.
    pub local_time: String,
    pub duration: String,
}

impl EventView {
    pub(crate) fn new(event: &Event, zone: CaptureZone) -> Self {
        Self {
            identity: event.identity().to_string(),
            camera: event.camera.clone(),
            filename: event.filename.clone(),
            captured: event.timestamp,
            local_time: zone.display(event.timestamp),
            duration: format_duration(event.duration),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub events: Vec<EventView>,
    pub cursor: Option<String>,
}

impl EventListResponse {
    pub(crate) fn from_page(page: &EventPage, zone: CaptureZone) -> Self {
        Self {
            events: page.events.iter().map(|e| EventView::new(e, zone)).collect(),
            cursor: page.cursor.as_ref().map(|c| c.as_str().to_string()),
        }
    }
}

/// Camera listing entry. Upload tokens are never exposed.
#[derive(Debug, Serialize)]
pub struct CameraView {
    pub id: String,
    pub name: String,
}

impl From<&Camera> for CameraView {
    fn from(camera: &Camera) -> Self {
        Self {
            id: camera.id().to_string(),
            name: camera.display_name().to_string(),
        }
    }
}
