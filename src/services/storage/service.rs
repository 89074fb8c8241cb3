//! High-level `StorageService` wrapper over backend implementations.

use super::backend::StorageBackend;
use super::filesystem::FilesystemBackend;
use super::memory::MemoryStorageBackend;
use super::types::{ObjectMeta, ObjectPage, UserMetadata};
use crate::constants::DEFAULT_LIST_PAGE_SIZE;
use anyhow::Result;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;

/// Object store handle used by the engine.
///
/// Wraps a [`StorageBackend`] and adds streaming over paginated listings.
/// `StorageService` is `Clone`; clones share the backend.
///
/// # Example
///
/// ```ignore
/// use clipkeep::services::storage::StorageService;
/// use futures::TryStreamExt;
///
/// let storage = StorageService::memory();
/// let mut objects = storage.list_stream(Some("basement/"));
/// while let Some(meta) = objects.try_next().await? {
///     println!("{} {}", meta.path, meta.content_type);
/// }
/// ```
#[derive(Clone)]
pub struct StorageService {
    backend: Arc<dyn StorageBackend>,
    page_size: usize,
}

impl StorageService {
    /// Creates a `StorageService` backed by a filesystem directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created or opened.
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::custom(FilesystemBackend::open(path)?))
    }

    /// Creates a `StorageService` backed by an in-memory store.
    pub fn memory() -> Self {
        Self::custom(MemoryStorageBackend::new())
    }

    /// Creates a `StorageService` with a custom backend.
    pub fn custom<B: StorageBackend>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }

    /// Creates a `StorageService` from a boxed backend.
    pub fn from_boxed(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Arc::from(backend),
            page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }

    /// Overrides the number of objects requested per listing page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Stores an object with user metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or storage fails.
    pub async fn put_object(
        &self,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: UserMetadata,
    ) -> Result<ObjectMeta> {
        self.backend.put(path, data, content_type, metadata).await
    }

    /// Retrieves an object and its metadata, `Ok(None)` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or retrieval fails.
    pub async fn get_object(&self, path: &str) -> Result<Option<(Vec<u8>, ObjectMeta)>> {
        self.backend.get(path).await
    }

    /// Deletes an object. `Ok(false)` means it was already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or deletion fails.
    pub async fn delete_object(&self, path: &str) -> Result<bool> {
        self.backend.delete(path).await
    }

    /// Retrieves object metadata without downloading the object.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or metadata cannot be read.
    pub async fn head_object(&self, path: &str) -> Result<Option<ObjectMeta>> {
        self.backend.head(path).await
    }

    /// Replaces the user metadata of an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the update fails.
    pub async fn update_metadata(
        &self,
        path: &str,
        metadata: UserMetadata,
    ) -> Result<Option<ObjectMeta>> {
        self.backend.update_metadata(path, metadata).await
    }

    /// Fetches a single listing page.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails.
    pub async fn list_page(
        &self,
        prefix: Option<&str>,
        after: Option<&str>,
    ) -> Result<ObjectPage> {
        self.backend.list(prefix, after, self.page_size).await
    }

    /// Streams every object under `prefix`, fetching pages lazily.
    ///
    /// The stream ends after the first error.
    pub fn list_stream(&self, prefix: Option<&str>) -> BoxStream<'static, Result<ObjectMeta>> {
        let backend = Arc::clone(&self.backend);
        let prefix = prefix.map(ToString::to_string);
        let page_size = self.page_size;

        // Outer `None` ends the listing, inner `None` is the first page.
        let pages = stream::try_unfold(Some(None::<String>), move |state| {
            next_page(Arc::clone(&backend), prefix.clone(), page_size, state)
        });

        pages
            .map_ok(|objects| stream::iter(objects.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }

    /// Collects a full listing into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if any page fails.
    pub async fn list_objects(&self, prefix: Option<&str>) -> Result<Vec<ObjectMeta>> {
        self.list_stream(prefix).try_collect().await
    }
}

type PageState = Option<Option<String>>;

async fn next_page(
    backend: Arc<dyn StorageBackend>,
    prefix: Option<String>,
    page_size: usize,
    state: PageState,
) -> Result<Option<(Vec<ObjectMeta>, PageState)>> {
    let Some(after) = state else {
        return Ok(None);
    };
    let page = backend
        .list(prefix.as_deref(), after.as_deref(), page_size)
        .await?;
    Ok(Some((page.objects, page.next.map(Some))))
}
