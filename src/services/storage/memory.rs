//! In-memory storage backend.
//!
//! Objects live in an ordered map so listings come back in name order,
//! which paginated listing depends on.

use super::backend::StorageBackend;
use super::types::{ObjectMeta, ObjectPage, UserMetadata, resolve_content_type};
use super::validation::normalize_name;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

#[derive(Clone)]
struct MemoryObject {
    data: Vec<u8>,
    meta: ObjectMeta,
}

/// In-memory object storage backend.
///
/// Cloning shares the underlying map. All data is lost when the process
/// exits; used by tests and the `memory` storage backend setting.
#[derive(Clone, Default)]
pub struct MemoryStorageBackend {
    objects: Arc<RwLock<BTreeMap<String, MemoryObject>>>,
}

impl MemoryStorageBackend {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of objects in the store.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: UserMetadata,
    ) -> Result<ObjectMeta> {
        let name = normalize_name(path)?;
        let now = Utc::now();

        let mut objects = self.objects.write();
        let created_at = objects.get(&name).map_or(now, |o| o.meta.created_at);
        let meta = ObjectMeta {
            content_type: resolve_content_type(&name, content_type),
            path: name.clone(),
            size: data.len() as u64,
            metadata,
            created_at,
            modified_at: now,
        };
        objects.insert(
            name,
            MemoryObject {
                data: data.to_vec(),
                meta: meta.clone(),
            },
        );

        Ok(meta)
    }

    async fn get(&self, path: &str) -> Result<Option<(Vec<u8>, ObjectMeta)>> {
        let name = normalize_name(path)?;
        Ok(self
            .objects
            .read()
            .get(&name)
            .map(|o| (o.data.clone(), o.meta.clone())))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let name = normalize_name(path)?;
        Ok(self.objects.write().remove(&name).is_some())
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let name = normalize_name(path)?;
        Ok(self.objects.read().get(&name).map(|o| o.meta.clone()))
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        after: Option<&str>,
        limit: usize,
    ) -> Result<ObjectPage> {
        let prefix = prefix.unwrap_or("");
        let start = match after {
            Some(after) if after >= prefix => Bound::Excluded(after.to_string()),
            _ => Bound::Included(prefix.to_string()),
        };

        let objects = self.objects.read();
        let page: Vec<ObjectMeta> = objects
            .range((start, Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(prefix))
            .take(limit)
            .map(|(_, o)| o.meta.clone())
            .collect();

        Ok(ObjectPage::from_objects(page, limit))
    }

    async fn update_metadata(
        &self,
        path: &str,
        metadata: UserMetadata,
    ) -> Result<Option<ObjectMeta>> {
        let name = normalize_name(path)?;
        let mut objects = self.objects.write();
        Ok(objects.get_mut(&name).map(|o| {
            o.meta.metadata = metadata;
            o.meta.modified_at = Utc::now();
            o.meta.clone()
        }))
    }
}
