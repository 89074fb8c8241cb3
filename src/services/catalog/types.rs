//! Catalog records, queries and cursors.

use crate::error::{Error, Result};
use crate::services::keyed::Keyable;
use chrono::{DateTime, Utc};
use redb::TableDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Event bodies keyed by identity.
pub(crate) const EVENTS_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("events");

/// Capture-time index: `(timestamp millis, identity)`.
pub(crate) const EVENTS_BY_TIME: TableDefinition<'static, (i64, &'static str), ()> =
    TableDefinition::new("events_by_time");

/// Composite identity of an event: `camera/filename`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKey(String);

impl EventKey {
    pub fn new(camera: &str, filename: &str) -> Self {
        Self(format!("{camera}/{filename}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Camera segment of the identity.
    pub fn camera(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(cam, _)| cam)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One indexed capture occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub camera: String,
    pub timestamp: DateTime<Utc>,
    pub filename: String,
    pub duration: Duration,
    /// Auxiliary metadata not covered by the reserved keys.
    #[serde(default)]
    pub metadata: Vec<(String, String)>,
    #[serde(skip)]
    key: Option<EventKey>,
}

impl Event {
    pub fn new(
        camera: impl Into<String>,
        filename: impl Into<String>,
        timestamp: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            camera: camera.into(),
            timestamp,
            filename: filename.into(),
            duration,
            metadata: Vec::new(),
            key: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Vec<(String, String)>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Identity derived from the record's own fields.
    pub fn identity(&self) -> EventKey {
        EventKey::new(&self.camera, &self.filename)
    }

    pub(crate) fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

impl Keyable for Event {
    type Key = EventKey;

    fn set_key(&mut self, key: EventKey) {
        self.key.get_or_insert(key);
    }

    fn key(&self) -> Option<&EventKey> {
        self.key.as_ref()
    }
}

/// Result ordering for [`EventQuery`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrder {
    /// Ascending identity (`camera/filename`).
    #[default]
    Identity,
    /// Most recent capture first.
    Newest,
    /// Oldest capture first.
    Oldest,
}

/// Filter and paging parameters for a catalog query.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub camera: Option<String>,
    /// Only events captured at or before this instant.
    pub captured_until: Option<DateTime<Utc>>,
    pub order: EventOrder,
    pub cursor: Option<Cursor>,
    pub limit: usize,
}

impl EventQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = Some(camera.into());
        self
    }

    #[must_use]
    pub fn captured_until(mut self, until: DateTime<Utc>) -> Self {
        self.captured_until = Some(until);
        self
    }

    #[must_use]
    pub fn order(mut self, order: EventOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn after(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// Filter handed to backends once the cursor has been decoded.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub camera: Option<String>,
    pub captured_until: Option<DateTime<Utc>>,
    pub order: EventOrder,
}

impl EventFilter {
    pub(crate) fn matches(&self, event: &Event) -> bool {
        self.camera.as_deref().is_none_or(|c| c == event.camera)
            && self.captured_until.is_none_or(|until| event.timestamp <= until)
    }

    /// Upper timestamp bound in index units.
    pub(crate) fn until_millis(&self) -> Option<i64> {
        self.captured_until.map(|t| t.timestamp_millis())
    }
}

/// Last row of a page; the next page starts strictly after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub order: EventOrder,
    pub timestamp_millis: i64,
    pub identity: String,
}

impl Position {
    pub(crate) fn of(event: &Event, order: EventOrder) -> Self {
        Self {
            order,
            timestamp_millis: event.timestamp_millis(),
            identity: event.identity().as_str().to_string(),
        }
    }

    /// Sort key matching the order this position was taken under.
    pub(crate) fn sort_key(&self) -> (i64, &str) {
        (self.timestamp_millis, self.identity.as_str())
    }
}

/// Opaque resume token for catalog pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub(crate) fn encode(position: &Position) -> Result<Self> {
        let json = serde_json::to_vec(position)
            .map_err(|e| Error::InvalidCursor(e.to_string()))?;
        Ok(Self(hex::encode(json)))
    }

    pub(crate) fn decode(&self, order: EventOrder) -> Result<Position> {
        let bytes = hex::decode(&self.0).map_err(|e| Error::InvalidCursor(e.to_string()))?;
        let position: Position =
            serde_json::from_slice(&bytes).map_err(|e| Error::InvalidCursor(e.to_string()))?;
        if position.order != order {
            return Err(Error::InvalidCursor(format!(
                "cursor was issued for {:?} ordering, query uses {order:?}",
                position.order
            )));
        }
        Ok(position)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<Event>,
    /// Present when more results may follow.
    pub cursor: Option<Cursor>,
}
