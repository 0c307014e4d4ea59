//! Object key validation.
//!
//! Keys are relative paths below the storage root. Anything that could
//! escape that root is refused before a backend ever sees it.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage key for security and correctness.
/// Ensures that keys don't escape the storage root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use interactives_storage::validate_path;
/// // Valid keys
/// assert!(validate_path("3f9a/bundle.zip").is_ok());
/// assert!(validate_path("a/../bundle.zip").is_ok()); // (never leaves storage root)
/// // Invalid keys
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// // Keys get resolved
/// assert_eq!(
///     validate_path("wrong/../still-wrong/.././3f9a//./bundle.zip/").unwrap(),
///     Path::new("3f9a/bundle.zip")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// Content-addressed key for an uploaded file: `{sha}/{base name}`.
///
/// Only the base name of the client-supplied file name is kept.
///
/// ```
/// use std::path::Path;
/// use interactives_storage::content_key;
/// assert_eq!(content_key("3f9a", "C:/Users/me/bundle.zip").unwrap(), Path::new("3f9a/bundle.zip"));
/// ```
pub fn content_key(sha: &str, file_name: &str) -> Result<PathBuf> {
    let base = Path::new(file_name)
        .file_name()
        .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidPath(PathBuf::from(file_name))))?;
    if sha.is_empty() || sha.contains(['/', '\\']) {
        exn::bail!(ErrorKind::InvalidPath(PathBuf::from(sha)));
    }
    validate(Path::new(sha).join(base))
}
