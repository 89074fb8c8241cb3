//! Types and constants for the object store.

use chrono::{DateTime, Utc};
use redb::TableDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Table for object metadata (filesystem backend).
pub(crate) const OBJECTS_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("objects");

/// Free-form string metadata attached to an object by its uploader.
pub type UserMetadata = BTreeMap<String, String>;

/// Metadata for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object name (e.g., "basement/20170518205540.mp4")
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// MIME content type (e.g., "video/mp4", "image/jpeg")
    pub content_type: String,
    /// Uploader-supplied metadata (`camera`, `captured`, `duration`, ...)
    #[serde(default)]
    pub metadata: UserMetadata,
    /// Timestamp when object was created
    pub created_at: DateTime<Utc>,
    /// Timestamp when object was last modified
    pub modified_at: DateTime<Utc>,
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectMeta>,
    /// Resume token for the next page; `None` once the listing is exhausted.
    pub next: Option<String>,
}

impl ObjectPage {
    /// Build a page, emitting a resume token only when the page is full.
    pub(crate) fn from_objects(objects: Vec<ObjectMeta>, limit: usize) -> Self {
        let next = if objects.len() >= limit {
            objects.last().map(|o| o.path.clone())
        } else {
            None
        };
        Self { objects, next }
    }
}

/// Resolve the content type for a new object.
pub(crate) fn resolve_content_type(path: &str, content_type: Option<&str>) -> String {
    content_type
        .map(ToString::to_string)
        .or_else(|| mime_guess::from_path(path).first().map(|m| m.to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
