//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for the object store across different backends (local
//! filesystem, S3-compatible services, in-memory for tests).

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All keys are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations should
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use interactives_storage::{StorageBackend, content_key, error::Result};
///
/// async fn store(backend: &dyn StorageBackend, sha: &str, upload: &Path) -> Result<String> {
///     backend.validate().await?;
///     let key = content_key(sha, "bundle.zip")?;
///     backend.upload(upload, &key).await
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// Check that the backend is reachable and able to accept writes.
    async fn validate(&self) -> Result<()>;

    /// Write bytes to a key, replacing any existing object.
    async fn write(&self, key: &Path, data: &[u8]) -> Result<()>;

    /// Copy a local file into the store and return where it landed.
    ///
    /// Default implementation buffers the whole file and delegates to
    /// [`write()`](Self::write); backends that can stream should override it.
    async fn upload(&self, source: &Path, key: &Path) -> Result<String> {
        let data = tokio::fs::read(source).await.map_err(ErrorKind::Io)?;
        self.write(key, &data).await?;
        Ok(self.location(key))
    }

    /// Human-readable location of a key, as reported by [`upload()`](Self::upload).
    fn location(&self, key: &Path) -> String {
        format!("{}://{}", self.name(), key.display())
    }
}
