//! In-memory storage backend for testing.

use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. The
/// backend can be flipped to "unavailable" to exercise failure paths.
///
/// # Examples
///
/// ```
/// use interactives_storage::backend::MockBackend;
/// use interactives_storage::StorageBackend;
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("abc/bundle.zip", b"PK")]);
/// assert!(backend.contains("abc/bundle.zip").await);
/// backend.write(Path::new("def/bundle.zip"), b"PK").await?;
/// assert_eq!(backend.object("def/bundle.zip").await.as_deref(), Some(&b"PK"[..]));
///
/// backend.set_unavailable(true);
/// assert!(backend.validate().await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, Vec<u8>>>,
    unavailable: AtomicBool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any key fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every call fail with [`ErrorKind::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether an object is stored under `key`. Invalid keys are never stored.
    pub async fn contains(&self, key: impl AsRef<Path>) -> bool {
        self.object(key).await.is_some()
    }

    /// Copy of the object stored under `key`, if any.
    pub async fn object(&self, key: impl AsRef<Path>) -> Option<Vec<u8>> {
        let key = validate_path(key.as_ref()).ok()?;
        self.storage.read().await.get(&key).cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Unavailable(self.name.clone()));
        }
        Ok(())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self) -> Result<()> {
        self.check_available()
    }

    async fn write(&self, key: &Path, data: &[u8]) -> Result<()> {
        self.check_available()?;
        let key = validate_path(key)?;
        self.storage.write().await.insert(key, data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_write_then_inspect() {
        let backend = MockBackend::default();
        backend.write(Path::new("test.zip"), b"hello").await.unwrap();
        assert_eq!(backend.object("test.zip").await.unwrap(), b"hello");
        assert!(!backend.contains("missing.zip").await);
        assert!(!backend.contains("../test.zip").await);
    }

    #[tokio::test]
    async fn test_default_upload_reads_source() {
        let backend = MockBackend::default().with_name("memory");
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"zip").unwrap();
        let location = backend.upload(source.path(), Path::new("sha/a.zip")).await.unwrap();
        assert_eq!(location, "memory://sha/a.zip");
        assert_eq!(backend.object("sha/a.zip").await.unwrap(), b"zip");
    }

    #[tokio::test]
    async fn test_unavailable() {
        let backend = MockBackend::default();
        backend.set_unavailable(true);
        let err = backend.write(Path::new("a.zip"), b"x").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unavailable(_)));
        backend.set_unavailable(false);
        backend.validate().await.unwrap();
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let backend = MockBackend::default();
        assert!(backend.write(Path::new("../escape.zip"), b"x").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        let _ = MockBackend::with_files([("../bad", b"x")]);
    }
}
