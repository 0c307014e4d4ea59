//! Local filesystem storage backend.
//!
//! Objects are stored in a configured directory and accessed using standard
//! filesystem operations via `tokio::fs` for async I/O.

use crate::error::ErrorKind;
use crate::{StorageBackend, error::Result, path::validate as validate_path};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage backend.
///
/// All keys are relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use interactives_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("uploads", "/var/lib/interactives/uploads")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory for stored archives
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }

        Ok(Self { name: name.into(), root })
    }

    /// Validates the key and joins it with the root directory.
    fn absolute_path(&self, key: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(key.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn ensure_parent(&self, abs_path: &Path, key: &Path) -> Result<()> {
        // Create parent directories if needed, to keep behaviour
        // consistent with S3-compatible storage.
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, key))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self) -> Result<()> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => Ok(()),
            Ok(_) => exn::bail!(ErrorKind::Unavailable(format!("{} is not a writable directory", self.root.display()))),
            Err(e) => exn::bail!(ErrorKind::Unavailable(format!("{}: {e}", self.root.display()))),
        }
    }

    async fn write(&self, key: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(key)?;
        self.ensure_parent(&abs_path, key).await?;
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, key))?)
    }

    async fn upload(&self, source: &Path, key: &Path) -> Result<String> {
        let abs_path = self.absolute_path(key)?;
        self.ensure_parent(&abs_path, key).await?;
        fs::copy(source, &abs_path).await.map_err(|e| Self::map_io_error(e, source))?;
        tracing::debug!(backend = %self.name, key = %key.display(), "stored archive");
        Ok(self.location(key))
    }

    fn location(&self, key: &Path) -> String {
        self.root.join(key).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("name", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("name", "relative/path").is_err());
        assert!(LocalBackend::new("name", "./relative").is_err());
    }

    #[test]
    fn test_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let expected = temp_dir.path().join("abc/bundle.zip");
        assert_eq!(backend.absolute_path(Path::new("abc/bundle.zip")).unwrap(), expected);
        // Path traversal is prevented
        assert!(backend.absolute_path(Path::new("../etc/passwd")).is_err());
    }

    #[tokio::test]
    async fn test_write_creates_parents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        backend.write(Path::new("a/b/c/test.zip"), b"PK").await.unwrap();
        assert_eq!(std::fs::read(temp_dir.path().join("a/b/c/test.zip")).unwrap(), b"PK");
    }

    #[tokio::test]
    async fn test_upload_missing_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        let source = temp_dir.path().join("nonexistent.zip");
        let err = backend.upload(&source, Path::new("sha/bundle.zip")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upload_copies_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path().join("store")).unwrap();
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"zip bytes").unwrap();
        let location = backend.upload(source.path(), Path::new("sha/bundle.zip")).await.unwrap();
        assert!(location.ends_with("sha/bundle.zip"));
        assert_eq!(std::fs::read(temp_dir.path().join("store/sha/bundle.zip")).unwrap(), b"zip bytes");
    }

    #[tokio::test]
    async fn test_validate() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("store");
        let backend = LocalBackend::new("name", &root).unwrap();
        backend.validate().await.unwrap();
        std::fs::remove_dir(&root).unwrap();
        let err = backend.validate().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_path_security() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("name", temp_dir.path()).unwrap();
        // Attempts to escape the root should fail
        assert!(backend.write(Path::new("etc/../../passwd"), b"data").await.is_err());
        assert!(backend.write(Path::new("../etc/passwd"), b"data").await.is_err());
    }
}
