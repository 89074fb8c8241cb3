//! Backend trait for the object store.
//!
//! The engine never touches blob bytes directly; everything it needs from
//! the store goes through this trait so the store can be swapped (local
//! filesystem, memory, a cloud bucket).

use super::types::{ObjectMeta, ObjectPage, UserMetadata};
use anyhow::Result;
use async_trait::async_trait;

/// Backend trait for object storage.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Stores an object, replacing any previous object with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the write fails.
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: UserMetadata,
    ) -> Result<ObjectMeta>;

    /// Retrieves an object and its metadata, `Ok(None)` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the read fails.
    async fn get(&self, path: &str) -> Result<Option<(Vec<u8>, ObjectMeta)>>;

    /// Deletes an object.
    ///
    /// # Returns
    /// * `Ok(true)` - Object existed and was deleted
    /// * `Ok(false)` - Object did not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or deletion fails.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// Retrieves object metadata without the object bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or metadata cannot be read.
    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>>;

    /// Lists one page of objects in name order.
    ///
    /// # Arguments
    /// * `prefix` - Only names starting with this string are returned
    /// * `after` - Resume token from a previous page (exclusive)
    /// * `limit` - Maximum number of objects in the page
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails.
    async fn list(
        &self,
        prefix: Option<&str>,
        after: Option<&str>,
        limit: usize,
    ) -> Result<ObjectPage>;

    /// Replaces the user metadata of an existing object.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the update fails.
    async fn update_metadata(&self, path: &str, metadata: UserMetadata)
    -> Result<Option<ObjectMeta>>;
}
