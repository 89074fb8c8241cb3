//! Object store service.
//!
//! Holds clip, thumbnail and snapshot blobs together with per-object user
//! metadata. Two backends ship with the crate:
//!
//! - [`FilesystemBackend`] - files on disk, metadata in redb
//! - [`MemoryStorageBackend`] - ordered in-memory map for tests
//!
//! Listings are paginated in name order; [`StorageService::list_stream`]
//! hides the pagination behind a `Stream`.

mod backend;
mod filesystem;
mod metadata;
mod memory;
mod service;
mod types;
mod validation;

pub use backend::StorageBackend;
pub use filesystem::FilesystemBackend;
pub use memory::MemoryStorageBackend;
pub use service::StorageService;
pub use types::{ObjectMeta, ObjectPage, UserMetadata};
