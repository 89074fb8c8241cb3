//! Filesystem-backed storage backend.
//!
//! Object bytes are plain files below the base directory; metadata is
//! tracked in redb (see [`super::metadata`]).

use super::backend::StorageBackend;
use super::metadata::{
    METADATA_DB, describe_untracked, load_metadata, reconcile, remove_metadata, save_metadata,
};
use super::types::{OBJECTS_TABLE, ObjectMeta, ObjectPage, UserMetadata, resolve_content_type};
use super::validation::{normalize_name, object_path};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableDatabase};
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filesystem-backed object storage backend.
///
/// `FilesystemBackend` is `Clone`; clones share the metadata database.
#[derive(Clone)]
pub struct FilesystemBackend {
    base_dir: PathBuf,
    db: Arc<Database>,
}

impl FilesystemBackend {
    /// Creates or opens the store at `base_dir`, reconciling metadata with
    /// the files found there.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or metadata database cannot be
    /// created, or reconciliation fails.
    pub fn open<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        fs::create_dir_all(&base_dir).with_context(|| {
            format!("Failed to create storage directory: {}", base_dir.display())
        })?;

        let db_path = base_dir.join(METADATA_DB);
        let db = Database::create(&db_path).with_context(|| {
            format!(
                "Failed to open storage metadata database: {}",
                db_path.display()
            )
        })?;

        let write_txn = db
            .begin_write()
            .context("Failed to begin initialization transaction")?;
        {
            let _table = write_txn
                .open_table(OBJECTS_TABLE)
                .context("Failed to initialize objects table")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initialization transaction")?;

        reconcile(&db, &base_dir)?;

        Ok(Self {
            base_dir,
            db: Arc::new(db),
        })
    }

    fn put_sync(
        &self,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: UserMetadata,
    ) -> Result<ObjectMeta> {
        let name = normalize_name(path)?;
        let file_path = object_path(&self.base_dir, &name)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directories for: {name}"))?;
        }
        fs::write(&file_path, data).with_context(|| format!("Failed to write object: {name}"))?;

        let now = Utc::now();
        let created_at = load_metadata(&self.db, &name)?.map_or(now, |m| m.created_at);
        let meta = ObjectMeta {
            content_type: resolve_content_type(&name, content_type),
            path: name,
            size: data.len() as u64,
            metadata,
            created_at,
            modified_at: now,
        };
        save_metadata(&self.db, &meta)?;

        Ok(meta)
    }

    fn head_sync(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let name = normalize_name(path)?;
        if !object_path(&self.base_dir, &name)?.is_file() {
            return Ok(None);
        }
        match load_metadata(&self.db, &name)? {
            Some(meta) => Ok(Some(meta)),
            None => describe_untracked(&self.base_dir, &name).map(Some),
        }
    }

    fn get_sync(&self, path: &str) -> Result<Option<(Vec<u8>, ObjectMeta)>> {
        let Some(meta) = self.head_sync(path)? else {
            return Ok(None);
        };
        let data = fs::read(object_path(&self.base_dir, &meta.path)?)
            .with_context(|| format!("Failed to read object: {}", meta.path))?;
        Ok(Some((data, meta)))
    }

    fn delete_sync(&self, path: &str) -> Result<bool> {
        let name = normalize_name(path)?;
        let file_path = object_path(&self.base_dir, &name)?;

        let existed = file_path.is_file();
        if existed {
            fs::remove_file(&file_path)
                .with_context(|| format!("Failed to delete object: {name}"))?;
        }
        remove_metadata(&self.db, &name)?;

        Ok(existed)
    }

    fn list_sync(&self, prefix: Option<&str>, after: Option<&str>, limit: usize) -> Result<ObjectPage> {
        let prefix = prefix.unwrap_or("");
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;
        let table = read_txn
            .open_table(OBJECTS_TABLE)
            .context("Failed to open objects table")?;

        let start = match after {
            Some(after) if after >= prefix => Bound::Excluded(after),
            _ => Bound::Included(prefix),
        };

        let mut objects = Vec::new();
        for item in table
            .range::<&str>((start, Bound::Unbounded))
            .context("Failed to range objects table")?
        {
            let (key, value) = item.context("Failed to read object entry")?;
            if !key.value().starts_with(prefix) || objects.len() >= limit {
                break;
            }
            match serde_json::from_slice::<ObjectMeta>(value.value()) {
                Ok(meta) => objects.push(meta),
                Err(e) => {
                    tracing::warn!(path = key.value(), error = %e, "Skipping unreadable object metadata");
                },
            }
        }

        Ok(ObjectPage::from_objects(objects, limit))
    }

    fn update_metadata_sync(&self, path: &str, metadata: UserMetadata) -> Result<Option<ObjectMeta>> {
        let Some(mut meta) = self.head_sync(path)? else {
            return Ok(None);
        };
        meta.metadata = metadata;
        meta.modified_at = Utc::now();
        save_metadata(&self.db, &meta)?;
        Ok(Some(meta))
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn put(
        &self,
        path: &str,
        data: &[u8],
        content_type: Option<&str>,
        metadata: UserMetadata,
    ) -> Result<ObjectMeta> {
        let backend = self.clone();
        let path = path.to_string();
        let data = data.to_vec();
        let content_type = content_type.map(ToString::to_string);
        tokio::task::spawn_blocking(move || {
            backend.put_sync(&path, &data, content_type.as_deref(), metadata)
        })
        .await
        .context("Task join error")?
    }

    async fn get(&self, path: &str) -> Result<Option<(Vec<u8>, ObjectMeta)>> {
        let backend = self.clone();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || backend.get_sync(&path))
            .await
            .context("Task join error")?
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let backend = self.clone();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || backend.delete_sync(&path))
            .await
            .context("Task join error")?
    }

    async fn head(&self, path: &str) -> Result<Option<ObjectMeta>> {
        let backend = self.clone();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || backend.head_sync(&path))
            .await
            .context("Task join error")?
    }

    async fn list(
        &self,
        prefix: Option<&str>,
        after: Option<&str>,
        limit: usize,
    ) -> Result<ObjectPage> {
        let backend = self.clone();
        let prefix = prefix.map(ToString::to_string);
        let after = after.map(ToString::to_string);
        tokio::task::spawn_blocking(move || {
            backend.list_sync(prefix.as_deref(), after.as_deref(), limit)
        })
        .await
        .context("Task join error")?
    }

    async fn update_metadata(
        &self,
        path: &str,
        metadata: UserMetadata,
    ) -> Result<Option<ObjectMeta>> {
        let backend = self.clone();
        let path = path.to_string();
        tokio::task::spawn_blocking(move || backend.update_metadata_sync(&path, metadata))
            .await
            .context("Task join error")?
    }
}
