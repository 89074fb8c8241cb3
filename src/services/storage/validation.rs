//! Object name validation.
//!
//! Object names double as relative filesystem paths in the filesystem
//! backend, so every name is normalized and checked before use.

use anyhow::{Result, bail};
use std::path::{Component, Path, PathBuf};

/// Normalize an object name to its canonical `a/b/c` form.
///
/// Rejects names that are empty, absolute, or contain `..`, root or
/// prefix components. `.` components are dropped.
pub(crate) fn normalize_name(name: &str) -> Result<String> {
    if name.is_empty() {
        bail!("Object name cannot be empty");
    }

    let path = Path::new(name);
    if path.is_absolute() {
        bail!("Object name cannot be absolute: {name}");
    }

    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {},
            Component::ParentDir => bail!("Object name cannot contain '..': {name}"),
            Component::RootDir | Component::Prefix(_) => {
                bail!("Object name cannot contain root or prefix: {name}")
            },
        }
    }

    if parts.is_empty() {
        bail!("Object name normalized to empty: {name}");
    }

    Ok(parts.join("/"))
}

/// Filesystem location of an object below `base_dir`.
pub(crate) fn object_path(base_dir: &Path, name: &str) -> Result<PathBuf> {
    let normalized = normalize_name(name)?;
    Ok(base_dir.join(normalized))
}
