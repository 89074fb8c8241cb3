//! Backend trait for the catalog index.

use super::types::{Event, EventFilter, EventKey, Position};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Storage backend for capture events.
///
/// Backends work on decoded positions; cursor encoding and the batch cap are
/// enforced by [`super::CatalogIndex`].
#[async_trait]
pub trait CatalogBackend: Send + Sync + 'static {
    /// Returns up to `limit` events matching `filter`, in `filter.order`,
    /// strictly after `after`.
    async fn query(
        &self,
        filter: &EventFilter,
        after: Option<&Position>,
        limit: usize,
    ) -> Result<Vec<Event>>;

    /// All identities, optionally restricted to one camera.
    async fn keys(&self, camera: Option<&str>) -> Result<HashSet<EventKey>>;

    /// Point lookup.
    async fn get(&self, key: &EventKey) -> Result<Option<Event>>;

    /// Inserts or replaces every event in one commit.
    async fn put_batch(&self, events: Vec<Event>) -> Result<()>;

    /// Removes an event. `Ok(false)` if it did not exist.
    async fn delete(&self, key: &EventKey) -> Result<bool>;
}
