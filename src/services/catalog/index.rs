//! High-level `CatalogIndex` wrapper over backend implementations.

use super::backend::CatalogBackend;
use super::memory::MemoryCatalogBackend;
use super::redb::RedbCatalogBackend;
use super::types::{Cursor, Event, EventFilter, EventKey, EventPage, EventQuery, Position};
use crate::constants::MAX_BATCH_SIZE;
use crate::error::{Error, Result};
use crate::services::keyed::Keyable;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Catalog of capture events.
///
/// Adds the pieces every backend shares: opaque cursors, the batch commit
/// cap, and keys attached to every event read back.
#[derive(Clone)]
pub struct CatalogIndex {
    backend: Arc<dyn CatalogBackend>,
}

impl CatalogIndex {
    /// Opens a redb-backed catalog at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self::custom(RedbCatalogBackend::open(path)?))
    }

    pub fn memory() -> Self {
        Self::custom(MemoryCatalogBackend::new())
    }

    pub fn custom<B: CatalogBackend>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_boxed(backend: Box<dyn CatalogBackend>) -> Self {
        Self {
            backend: Arc::from(backend),
        }
    }

    /// Fetches one page of events.
    ///
    /// A cursor is returned whenever the page came back full; the following
    /// page may still be empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCursor`] for a malformed cursor or one issued
    /// under a different ordering, [`Error::Catalog`] if the backend fails.
    pub async fn query(&self, query: &EventQuery) -> Result<EventPage> {
        let after = query
            .cursor
            .as_ref()
            .map(|c| c.decode(query.order))
            .transpose()?;
        let filter = EventFilter {
            camera: query.camera.clone(),
            captured_until: query.captured_until,
            order: query.order,
        };
        let limit = query.limit.max(1);

        let mut events = self
            .backend
            .query(&filter, after.as_ref(), limit)
            .await
            .map_err(Error::Catalog)?;
        for event in &mut events {
            let key = event.identity();
            event.set_key(key);
        }

        let cursor = match events.last() {
            Some(last) if events.len() >= limit => {
                Some(Cursor::encode(&Position::of(last, query.order))?)
            },
            _ => None,
        };

        Ok(EventPage { events, cursor })
    }

    /// Identity set for existence checks, globally or for one camera.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] if the backend fails.
    pub async fn keys(&self, camera: Option<&str>) -> Result<HashSet<EventKey>> {
        self.backend.keys(camera).await.map_err(Error::Catalog)
    }

    /// Point lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] if the backend fails.
    pub async fn get(&self, key: &EventKey) -> Result<Option<Event>> {
        let mut event = self.backend.get(key).await.map_err(Error::Catalog)?;
        if let Some(event) = event.as_mut() {
            event.set_key(key.clone());
        }
        Ok(event)
    }

    /// Commits a batch of events as a single unit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchTooLarge`] above [`MAX_BATCH_SIZE`] entries and
    /// [`Error::Catalog`] if the commit fails.
    pub async fn put_batch(&self, events: Vec<Event>) -> Result<()> {
        if events.len() > MAX_BATCH_SIZE {
            return Err(Error::BatchTooLarge {
                size: events.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        if events.is_empty() {
            return Ok(());
        }
        self.backend.put_batch(events).await.map_err(Error::Catalog)
    }

    /// Removes an event; `Ok(false)` if it was already gone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] if the backend fails.
    pub async fn delete(&self, key: &EventKey) -> Result<bool> {
        self.backend.delete(key).await.map_err(Error::Catalog)
    }
}
