//! Safe path resolution within a user's storage root
//!
//! Every transfer names a file by a single path component. Resolution layers
//! three defenses against escaping the storage root: component validation
//! before touching the filesystem, canonicalization to resolve symlinks, and
//! a prefix check against the root.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Error type for path resolution failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Name is empty, contains a separator, or is a dot segment
    InvalidName,
    /// Resolved path escapes the storage root
    AccessDenied,
    /// Path does not exist on the filesystem
    NotFound,
    /// Failed to canonicalize the path
    CanonicalizeFailed(String),
    /// The storage root is not an absolute path
    InvalidStorageRoot,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "invalid filename"),
            Self::AccessDenied => write!(f, "path escapes the storage root"),
            Self::NotFound => write!(f, "file not found"),
            Self::CanonicalizeFailed(e) => write!(f, "failed to resolve path: {}", e),
            Self::InvalidStorageRoot => write!(f, "storage root is not absolute"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for io::Error {
    fn from(e: PathError) -> Self {
        match e {
            PathError::InvalidName => io::Error::new(io::ErrorKind::InvalidInput, e.to_string()),
            PathError::AccessDenied => {
                io::Error::new(io::ErrorKind::PermissionDenied, e.to_string())
            }
            PathError::NotFound => io::Error::new(io::ErrorKind::NotFound, e.to_string()),
            PathError::CanonicalizeFailed(_) => io::Error::other(e.to_string()),
            PathError::InvalidStorageRoot => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
        }
    }
}

/// Validate that a requested filename is a single normal path component.
///
/// Rejects empty names, dot segments (`.`, `..`), separators (`/`, `\`),
/// null bytes, and anything `Path::components` does not see as exactly one
/// `Component::Normal`.
pub fn validate_name(name: &str) -> Result<(), PathError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(PathError::InvalidName);
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(PathError::InvalidName);
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(PathError::InvalidName),
    }
}

/// Resolve an existing file under the storage root.
///
/// `storage_root` must be absolute and canonical (from `fs::canonicalize`).
/// The name is validated, the joined path canonicalized, and the result
/// checked to still sit under the root, so a symlink planted inside the
/// root cannot reach outside it.
pub fn resolve_existing(storage_root: &Path, name: &str) -> Result<PathBuf, PathError> {
    if !storage_root.is_absolute() {
        return Err(PathError::InvalidStorageRoot);
    }

    validate_name(name)?;

    let candidate = storage_root.join(name);

    let canonical = candidate.canonicalize().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            PathError::NotFound
        } else {
            PathError::CanonicalizeFailed(e.to_string())
        }
    })?;

    if !canonical.starts_with(storage_root) {
        return Err(PathError::AccessDenied);
    }

    Ok(canonical)
}

/// Resolve a destination for a file that does not exist yet.
///
/// The final component cannot be canonicalized, so only the name is
/// validated; the parent is the storage root itself, which the caller
/// already canonicalized.
pub fn resolve_new(storage_root: &Path, name: &str) -> Result<PathBuf, PathError> {
    if !storage_root.is_absolute() {
        return Err(PathError::InvalidStorageRoot);
    }

    validate_name(name)?;

    Ok(storage_root.join(name))
}
