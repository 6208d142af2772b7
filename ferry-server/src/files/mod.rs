//! Storage area management
//!
//! Handles storage root initialization and collision-safe destination
//! naming for uploads. Per-user subtrees live directly under the root,
//! one directory per username, created by the user store at signup.

use std::path::{Path, PathBuf};

use crate::constants::{DATA_DIR_NAME, STORAGE_DIR_NAME};

pub mod path;

pub use path::{PathError, resolve_existing, resolve_new, validate_name};

/// Get the default storage root path for the platform
///
/// - **Linux**: `~/.local/share/ferryd/storage/`
/// - **macOS**: `~/Library/Application Support/ferryd/storage/`
/// - **Windows**: `%APPDATA%\ferryd\storage\`
///
/// # Errors
///
/// Returns an error if the platform's data directory cannot be determined.
pub fn default_storage_root() -> Result<PathBuf, String> {
    let data_dir = dirs::data_dir().ok_or_else(|| crate::constants::ERR_NO_DATA_DIR.to_string())?;
    Ok(data_dir.join(DATA_DIR_NAME).join(STORAGE_DIR_NAME))
}

/// Create the storage root if needed and return its canonical path.
///
/// Path containment checks compare canonical paths, so the root must be
/// canonicalized once here rather than trusted as given.
pub fn init_storage_root(root: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(root)
        .map_err(|e| format!("failed to create {}: {}", root.display(), e))?;
    root.canonicalize()
        .map_err(|e| format!("failed to canonicalize {}: {}", root.display(), e))
}

/// Pick a destination path for an upload, renaming to avoid collisions.
///
/// If `requested` is free, it is used as-is. Otherwise `base (1).ext`,
/// `base (2).ext`, ... are tried until a free name is found. Returns the
/// destination path and the chosen name; the caller reports the rename to
/// the peer when the chosen name differs from the request.
///
/// Two sessions of the same user racing the same name can both see it as
/// free; there is no file locking, so the later writer wins.
pub fn unique_destination(dir: &Path, requested: &str) -> (PathBuf, String) {
    let candidate = dir.join(requested);
    if !candidate.exists() {
        return (candidate, requested.to_string());
    }

    let (stem, extension) = split_name(requested);
    let mut n: u32 = 1;
    loop {
        let name = match extension {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(&name);
        if !candidate.exists() {
            return (candidate, name);
        }
        n += 1;
    }
}

/// Split a filename into stem and extension at the last dot.
///
/// A leading dot is part of the stem, so hidden files rename as
/// `.hidden (1)` rather than ` (1).hidden`.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}
