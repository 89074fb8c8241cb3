//! Metadata table operations for the filesystem backend.
//!
//! Object bytes live as plain files; sizes, content types and the user
//! metadata map live in redb. The two can drift when files are touched
//! outside the service, so [`reconcile`] realigns them when the store opens.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::types::{OBJECTS_TABLE, ObjectMeta, UserMetadata, resolve_content_type};

/// Name of the metadata database inside the storage directory.
pub(crate) const METADATA_DB: &str = "metadata.redb";

pub(crate) fn save_metadata(db: &Database, meta: &ObjectMeta) -> Result<()> {
    let write_txn = db
        .begin_write()
        .context("Failed to begin write transaction")?;
    {
        let mut table = write_txn
            .open_table(OBJECTS_TABLE)
            .context("Failed to open objects table")?;
        let json = serde_json::to_vec(meta).context("Failed to serialize object metadata")?;
        table
            .insert(meta.path.as_str(), json.as_slice())
            .with_context(|| format!("Failed to insert object metadata: {}", meta.path))?;
    }
    write_txn
        .commit()
        .context("Failed to commit metadata save transaction")?;
    Ok(())
}

pub(crate) fn load_metadata(db: &Database, path: &str) -> Result<Option<ObjectMeta>> {
    let read_txn = db
        .begin_read()
        .context("Failed to begin read transaction")?;
    let table = read_txn
        .open_table(OBJECTS_TABLE)
        .context("Failed to open objects table")?;

    match table
        .get(path)
        .with_context(|| format!("Failed to read object metadata: {path}"))?
    {
        Some(guard) => {
            let meta = serde_json::from_slice(guard.value())
                .with_context(|| format!("Failed to deserialize object metadata: {path}"))?;
            Ok(Some(meta))
        },
        None => Ok(None),
    }
}

pub(crate) fn remove_metadata(db: &Database, path: &str) -> Result<()> {
    let write_txn = db
        .begin_write()
        .context("Failed to begin write transaction")?;
    {
        let mut table = write_txn
            .open_table(OBJECTS_TABLE)
            .context("Failed to open objects table")?;
        table
            .remove(path)
            .with_context(|| format!("Failed to remove object metadata: {path}"))?;
    }
    write_txn
        .commit()
        .context("Failed to commit metadata removal transaction")?;
    Ok(())
}

/// Build metadata for a file that has no entry in the table.
///
/// Timestamps come from the file itself so an adopted clip doesn't look
/// brand new to age-based sweeps.
pub(crate) fn describe_untracked(base_dir: &Path, path: &str) -> Result<ObjectMeta> {
    let file_meta = fs::metadata(base_dir.join(path))
        .with_context(|| format!("Failed to get file metadata: {path}"))?;
    let modified_at: DateTime<Utc> = file_meta
        .modified()
        .map_or_else(|_| Utc::now(), DateTime::<Utc>::from);

    Ok(ObjectMeta {
        path: path.to_string(),
        size: file_meta.len(),
        content_type: resolve_content_type(path, None),
        metadata: UserMetadata::new(),
        created_at: modified_at,
        modified_at,
    })
}

/// Realign the metadata table with the files on disk.
///
/// Removes entries whose file is gone, adopts files without an entry and
/// refreshes sizes that changed. User metadata of surviving entries is kept.
pub(crate) fn reconcile(db: &Database, base_dir: &Path) -> Result<()> {
    tracing::debug!(base_dir = %base_dir.display(), "Reconciling object metadata");

    let mut on_disk: HashSet<String> = HashSet::new();
    scan_directory(base_dir, base_dir, &mut on_disk)?;

    let mut orphaned: Vec<String> = Vec::new();
    let mut resized: Vec<(ObjectMeta, u64)> = Vec::new();
    {
        let read_txn = db
            .begin_read()
            .context("Failed to begin read transaction for reconciliation")?;
        let table = read_txn
            .open_table(OBJECTS_TABLE)
            .context("Failed to open objects table for reconciliation")?;

        for item in table.iter().context("Failed to iterate objects table")? {
            let (key, value) = item.context("Failed to read object entry")?;
            let path = key.value().to_string();

            if !on_disk.remove(&path) {
                orphaned.push(path);
                continue;
            }
            if let Ok(meta) = serde_json::from_slice::<ObjectMeta>(value.value())
                && let Ok(file_meta) = fs::metadata(base_dir.join(&path))
                && file_meta.len() != meta.size
            {
                resized.push((meta, file_meta.len()));
            }
        }
    }

    for path in &orphaned {
        remove_metadata(db, path)?;
    }
    for path in &on_disk {
        save_metadata(db, &describe_untracked(base_dir, path)?)?;
    }
    for (meta, size) in &resized {
        let mut meta = meta.clone();
        meta.size = *size;
        meta.modified_at = Utc::now();
        save_metadata(db, &meta)?;
    }

    if orphaned.len() + on_disk.len() + resized.len() > 0 {
        tracing::info!(
            orphaned = orphaned.len(),
            untracked = on_disk.len(),
            resized = resized.len(),
            "Object metadata reconciled"
        );
    }

    Ok(())
}

fn scan_directory(base_dir: &Path, dir: &Path, files: &mut HashSet<String>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();

        if path.file_name().is_some_and(|n| n == METADATA_DB)
            || path.extension().is_some_and(|e| e == "lock")
        {
            continue;
        }

        if path.is_dir() {
            scan_directory(base_dir, &path, files)?;
        } else if path.is_file()
            && let Ok(relative) = path.strip_prefix(base_dir)
        {
            files.insert(relative.to_string_lossy().replace('\\', "/"));
        }
    }

    Ok(())
}
