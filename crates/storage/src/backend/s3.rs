//! S3-compatible storage backend.
//!
//! Works against AWS S3 and S3-compatible services (MinIO, Backblaze B2,
//! LocalStack, ...). Credentials are provided explicitly via configuration.

use crate::{
    StorageBackend,
    error::{ErrorKind, Result},
    validate_path,
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use exn::{OptionExt, ResultExt};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible storage backend.
///
/// Stores archives in a bucket, optionally under a key prefix.
///
/// # Examples
///
/// ```no_run
/// use interactives_storage::backend::S3Backend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "uploads",
///     "dp-interactives-file-uploads",
///     None,
///     "eu-west-1",
///     Some("http://localhost:4566".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub async fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix
            .map(validate_path)
            .transpose()?
            .map(|p| p.to_str().map(|s| s.to_string()).ok_or_raise(|| ErrorKind::InvalidPath(p)))
            .transpose()?;
        let credentials = Credentials::new(key_id, key_secret, None, None, "interactives-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.into()))
            // Exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing for S3-compatible services.
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.into(),
            prefix,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, key: &Path) -> Result<String> {
        let validated = validate_path(key)?;
        let key_str = validated.to_str().ok_or_raise(|| ErrorKind::InvalidPath(validated.clone()))?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key_str),
            None => key_str.to_string(),
        })
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::Backend("S3 rate limiter closed".to_string()))
    }

    fn network<E: std::error::Error>(err: E) -> ErrorKind {
        ErrorKind::Network(DisplayErrorContext(&err).to_string())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self) -> Result<()> {
        let _permit = self.acquire_permit().await?;
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| ErrorKind::Unavailable(format!("bucket {}: {}", self.bucket, DisplayErrorContext(&e))))?;
        Ok(())
    }

    async fn write(&self, key: &Path, data: &[u8]) -> Result<()> {
        let full_key = self.full_key(key)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(Self::network)?;
        Ok(())
    }

    async fn upload(&self, source: &Path, key: &Path) -> Result<String> {
        let full_key = self.full_key(key)?;
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| ErrorKind::Backend(format!("cannot stream {}: {e}", source.display())))?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .body(body)
            .send()
            .await
            .map_err(Self::network)?;
        tracing::debug!(backend = %self.name, bucket = %self.bucket, key = %full_key, "stored archive");
        Ok(self.location(key))
    }

    fn location(&self, key: &Path) -> String {
        match self.full_key(key) {
            Ok(full_key) => format!("s3://{}/{}", self.bucket, full_key),
            Err(_) => format!("s3://{}/{}", self.bucket, key.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend(prefix: Option<&str>) -> S3Backend {
        S3Backend::new(
            "test",
            "bucket",
            prefix.map(str::to_string),
            "eu-west-1",
            Some("http://localhost:4566"),
            "key",
            "secret",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_full_key_without_prefix() {
        let backend = backend(None).await;
        assert_eq!(backend.full_key(Path::new("sha/bundle.zip")).unwrap(), "sha/bundle.zip");
    }

    #[tokio::test]
    async fn test_full_key_with_prefix() {
        let backend = backend(Some("uploads/")).await;
        assert_eq!(backend.full_key(Path::new("sha/bundle.zip")).unwrap(), "uploads/sha/bundle.zip");
        assert_eq!(backend.location(Path::new("sha/bundle.zip")), "s3://bucket/uploads/sha/bundle.zip");
    }

    #[tokio::test]
    async fn test_full_key_rejects_traversal() {
        let backend = backend(None).await;
        assert!(backend.full_key(Path::new("../bundle.zip")).is_err());
    }

    #[tokio::test]
    async fn test_prefix_is_validated() {
        let result = S3Backend::new("t", "b", Some("../up".to_string()), "eu-west-1", None::<String>, "k", "s").await;
        assert!(result.is_err());
    }
}
