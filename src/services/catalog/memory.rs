//! In-memory catalog backend.

use super::backend::CatalogBackend;
use super::types::{Event, EventFilter, EventKey, EventOrder, Position};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Catalog held in an ordered map keyed by identity.
///
/// Cloning shares the map.
#[derive(Clone, Default)]
pub struct MemoryCatalogBackend {
    events: Arc<RwLock<BTreeMap<EventKey, Event>>>,
}

impl MemoryCatalogBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

fn past_position(event: &Event, order: EventOrder, position: &Position) -> bool {
    let id = event.identity();
    let key = (event.timestamp_millis(), id.as_str());
    match order {
        EventOrder::Identity => id.as_str() > position.identity.as_str(),
        EventOrder::Oldest => key > position.sort_key(),
        EventOrder::Newest => key < position.sort_key(),
    }
}

#[async_trait]
impl CatalogBackend for MemoryCatalogBackend {
    async fn query(
        &self,
        filter: &EventFilter,
        after: Option<&Position>,
        limit: usize,
    ) -> Result<Vec<Event>> {
        let events = self.events.read();
        let mut matched: Vec<Event> = events
            .values()
            .filter(|e| filter.matches(e))
            .filter(|e| after.is_none_or(|p| past_position(e, filter.order, p)))
            .cloned()
            .collect();

        match filter.order {
            EventOrder::Identity => {},
            EventOrder::Oldest => {
                matched.sort_by(|a, b| {
                    (a.timestamp_millis(), a.identity()).cmp(&(b.timestamp_millis(), b.identity()))
                });
            },
            EventOrder::Newest => {
                matched.sort_by(|a, b| {
                    (b.timestamp_millis(), b.identity()).cmp(&(a.timestamp_millis(), a.identity()))
                });
            },
        }
        matched.truncate(limit);

        Ok(matched)
    }

    async fn keys(&self, camera: Option<&str>) -> Result<HashSet<EventKey>> {
        Ok(self
            .events
            .read()
            .keys()
            .filter(|k| camera.is_none_or(|c| k.camera() == c))
            .cloned()
            .collect())
    }

    async fn get(&self, key: &EventKey) -> Result<Option<Event>> {
        Ok(self.events.read().get(key).cloned())
    }

    async fn put_batch(&self, events: Vec<Event>) -> Result<()> {
        let mut map = self.events.write();
        for event in events {
            map.insert(event.identity(), event);
        }
        Ok(())
    }

    async fn delete(&self, key: &EventKey) -> Result<bool> {
        Ok(self.events.write().remove(key).is_some())
    }
}
