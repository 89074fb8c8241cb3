//! Path utilities for clipkeep data.
//!
//! # Base Directory
//! - [`get_home_dir`] - `~/.clipkeep/` (base directory for all clipkeep data)
//!
//! # Derived Paths
//! - [`get_config_path`] - `~/.clipkeep/clipkeep.toml`
//! - [`get_storage_dir`] - `~/.clipkeep/storage/` (filesystem object store)
//! - [`get_catalog_path`] - `~/.clipkeep/catalog.redb` (event catalog)

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the clipkeep base directory.
///
/// Resolution order:
/// 1. `CLIPKEEP_HOME` environment variable (if set)
/// 2. `~/.clipkeep/` (default)
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("CLIPKEEP_HOME")
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".clipkeep"))
}

/// Get the default config path: `~/.clipkeep/clipkeep.toml`
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("clipkeep.toml"))
}

/// Get the default object store directory: `~/.clipkeep/storage/`
pub fn get_storage_dir() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("storage"))
}

/// Get the default catalog database path: `~/.clipkeep/catalog.redb`
pub fn get_catalog_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("catalog.redb"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths_structure() {
        let base = get_home_dir().unwrap();
        assert!(get_config_path().unwrap().starts_with(&base));
        assert!(get_storage_dir().unwrap().starts_with(&base));
        assert!(get_catalog_path().unwrap().starts_with(&base));
    }

    #[test]
    fn test_path_extensions() {
        let catalog = get_catalog_path().unwrap();
        assert_eq!(catalog.extension().and_then(|e| e.to_str()), Some("redb"));

        let config = get_config_path().unwrap();
        assert_eq!(config.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
