//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// An archive store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("no archive stored at {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The process or the credentials may not touch this key.
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The remote store could not be reached.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Bucket or root directory missing, or the store is refusing writes.
    #[display("archive store unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    /// Key escapes the store root or cannot be represented.
    #[display("invalid key: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    #[display("archive store error: {_0}")]
    Backend(#[error(not(source))] String),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Transient failures: the same upload may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Network(_) | Self::Unavailable(_) | Self::Backend(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_keys_are_not_retried() {
        assert!(!ErrorKind::InvalidPath(PathBuf::from("../x")).is_retryable());
        assert!(!ErrorKind::NotFound(PathBuf::from("abc/bundle.zip")).is_retryable());
        assert!(ErrorKind::Unavailable("mock".to_string()).is_retryable());
    }
}
