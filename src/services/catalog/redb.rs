//! Redb-backed catalog backend.
//!
//! Event bodies are JSON in [`EVENTS_TABLE`]; [`EVENTS_BY_TIME`] indexes them
//! by capture time so age-bounded and recency queries are range scans.

use super::backend::CatalogBackend;
use super::types::{EVENTS_BY_TIME, EVENTS_TABLE, Event, EventFilter, EventKey, EventOrder, Position};
use anyhow::{Context, Result};
use async_trait::async_trait;
use redb::{Database, ReadOnlyTable, ReadableDatabase, ReadableTable};
use std::collections::HashSet;
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

/// Persistent catalog backend.
///
/// `RedbCatalogBackend` is `Clone`; clones share the database.
#[derive(Clone)]
pub struct RedbCatalogBackend {
    db: Arc<Database>,
}

impl RedbCatalogBackend {
    /// Opens or creates the catalog database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or database cannot be
    /// created, or table initialization fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create catalog directory: {}", parent.display())
            })?;
        }

        let db = Database::create(path)
            .with_context(|| format!("Failed to open catalog database: {}", path.display()))?;

        let write_txn = db
            .begin_write()
            .context("Failed to begin initialization transaction")?;
        {
            let _events = write_txn
                .open_table(EVENTS_TABLE)
                .context("Failed to initialize events table")?;
            let _index = write_txn
                .open_table(EVENTS_BY_TIME)
                .context("Failed to initialize capture-time index")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initialization transaction")?;

        Ok(Self { db: Arc::new(db) })
    }

    fn decode(key: &str, bytes: &[u8]) -> Result<Event> {
        serde_json::from_slice(bytes).with_context(|| format!("Failed to deserialize event: {key}"))
    }

    fn load(table: &ReadOnlyTable<&'static str, &'static [u8]>, key: &str) -> Result<Option<Event>> {
        match table
            .get(key)
            .with_context(|| format!("Failed to read event: {key}"))?
        {
            Some(guard) => Self::decode(key, guard.value()).map(Some),
            None => Ok(None),
        }
    }

    fn query_by_identity(
        &self,
        filter: &EventFilter,
        after: Option<&Position>,
        limit: usize,
    ) -> Result<Vec<Event>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(EVENTS_TABLE)
            .context("Failed to open events table")?;

        let prefix = filter.camera.as_ref().map(|c| format!("{c}/"));
        let prefix = prefix.as_deref().unwrap_or("");
        let start = match after {
            Some(p) if p.identity.as_str() >= prefix => Bound::Excluded(p.identity.as_str()),
            _ => Bound::Included(prefix),
        };

        let mut events = Vec::new();
        for item in table
            .range::<&str>((start, Bound::Unbounded))
            .context("Failed to range events table")?
        {
            let (key, value) = item.context("Failed to read event entry")?;
            if !key.value().starts_with(prefix) || events.len() >= limit {
                break;
            }
            let event = Self::decode(key.value(), value.value())?;
            if filter.matches(&event) {
                events.push(event);
            }
        }

        Ok(events)
    }

    fn query_by_time(
        &self,
        filter: &EventFilter,
        after: Option<&Position>,
        limit: usize,
    ) -> Result<Vec<Event>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let index = read_txn
            .open_table(EVENTS_BY_TIME)
            .context("Failed to open capture-time index")?;
        let table = read_txn
            .open_table(EVENTS_TABLE)
            .context("Failed to open events table")?;

        // Smallest key past the inclusive time bound.
        let until = filter
            .until_millis()
            .map_or(Bound::Unbounded, |ms| Bound::Excluded((ms.saturating_add(1), "")));
        let (lower, upper) = match (filter.order, after) {
            (EventOrder::Newest, Some(p)) => (Bound::Unbounded, Bound::Excluded(p.sort_key())),
            (_, Some(p)) => (Bound::Excluded(p.sort_key()), until),
            (_, None) => (Bound::Unbounded, until),
        };

        let range = index
            .range::<(i64, &str)>((lower, upper))
            .context("Failed to range capture-time index")?;
        let entries: Box<dyn Iterator<Item = _>> = if filter.order == EventOrder::Newest {
            Box::new(range.rev())
        } else {
            Box::new(range)
        };

        let mut events = Vec::new();
        for item in entries {
            if events.len() >= limit {
                break;
            }
            let (key, _) = item.context("Failed to read index entry")?;
            let (_, identity) = key.value();
            let Some(event) = Self::load(&table, identity)? else {
                tracing::warn!(identity, "Capture-time index points at a missing event");
                continue;
            };
            if filter.matches(&event) {
                events.push(event);
            }
        }

        Ok(events)
    }

    fn keys_sync(&self, camera: Option<&str>) -> Result<HashSet<EventKey>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(EVENTS_TABLE)
            .context("Failed to open events table")?;

        let prefix = camera.map(|c| format!("{c}/"));
        let prefix = prefix.as_deref().unwrap_or("");

        let mut keys = HashSet::new();
        for item in table
            .range::<&str>(prefix..)
            .context("Failed to range events table")?
        {
            let (key, _) = item.context("Failed to read event entry")?;
            if !key.value().starts_with(prefix) {
                break;
            }
            keys.insert(EventKey::from(key.value()));
        }

        Ok(keys)
    }

    fn get_sync(&self, key: &EventKey) -> Result<Option<Event>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(EVENTS_TABLE)
            .context("Failed to open events table")?;
        Self::load(&table, key.as_str())
    }

    fn put_batch_sync(&self, events: &[Event]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let mut table = write_txn
                .open_table(EVENTS_TABLE)
                .context("Failed to open events table")?;
            let mut index = write_txn
                .open_table(EVENTS_BY_TIME)
                .context("Failed to open capture-time index")?;

            for event in events {
                let identity = event.identity();
                let json = serde_json::to_vec(event).context("Failed to serialize event")?;

                let previous = table
                    .insert(identity.as_str(), json.as_slice())
                    .with_context(|| format!("Failed to insert event: {identity}"))?
                    .map(|old| Self::decode(identity.as_str(), old.value()))
                    .transpose()?;
                if let Some(previous) = previous {
                    index
                        .remove((previous.timestamp_millis(), identity.as_str()))
                        .with_context(|| format!("Failed to unindex event: {identity}"))?;
                }
                index
                    .insert((event.timestamp_millis(), identity.as_str()), ())
                    .with_context(|| format!("Failed to index event: {identity}"))?;
            }
        }
        write_txn
            .commit()
            .context("Failed to commit event batch")?;

        Ok(())
    }

    fn delete_sync(&self, key: &EventKey) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        let existed;
        {
            let mut table = write_txn
                .open_table(EVENTS_TABLE)
                .context("Failed to open events table")?;
            let mut index = write_txn
                .open_table(EVENTS_BY_TIME)
                .context("Failed to open capture-time index")?;

            let removed = table
                .remove(key.as_str())
                .with_context(|| format!("Failed to delete event: {key}"))?
                .map(|old| Self::decode(key.as_str(), old.value()))
                .transpose()?;
            existed = removed.is_some();
            if let Some(event) = removed {
                index
                    .remove((event.timestamp_millis(), key.as_str()))
                    .with_context(|| format!("Failed to unindex event: {key}"))?;
            }
        }
        write_txn
            .commit()
            .context("Failed to commit event deletion")?;

        Ok(existed)
    }
}

#[async_trait]
impl CatalogBackend for RedbCatalogBackend {
    async fn query(
        &self,
        filter: &EventFilter,
        after: Option<&Position>,
        limit: usize,
    ) -> Result<Vec<Event>> {
        let backend = self.clone();
        let filter = filter.clone();
        let after = after.cloned();
        tokio::task::spawn_blocking(move || match filter.order {
            EventOrder::Identity => backend.query_by_identity(&filter, after.as_ref(), limit),
            EventOrder::Newest | EventOrder::Oldest => {
                backend.query_by_time(&filter, after.as_ref(), limit)
            },
        })
        .await
        .context("Task join error")?
    }

    async fn keys(&self, camera: Option<&str>) -> Result<HashSet<EventKey>> {
        let backend = self.clone();
        let camera = camera.map(ToString::to_string);
        tokio::task::spawn_blocking(move || backend.keys_sync(camera.as_deref()))
            .await
            .context("Task join error")?
    }

    async fn get(&self, key: &EventKey) -> Result<Option<Event>> {
        let backend = self.clone();
        let key = key.clone();
        tokio::task::spawn_blocking(move || backend.get_sync(&key))
            .await
            .context("Task join error")?
    }

    async fn put_batch(&self, events: Vec<Event>) -> Result<()> {
        let backend = self.clone();
        tokio::task::spawn_blocking(move || backend.put_batch_sync(&events))
            .await
            .context("Task join error")?
    }

    async fn delete(&self, key: &EventKey) -> Result<bool> {
        let backend = self.clone();
        let key = key.clone();
        tokio::task::spawn_blocking(move || backend.delete_sync(&key))
            .await
            .context("Task join error")?
    }
}
