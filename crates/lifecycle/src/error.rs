//! Lifecycle Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use interactives_models::Violations;

/// A lifecycle error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was malformed; every problem is listed.
    #[display("{_0}")]
    Validation(#[error(not(source))] Violations),
    /// The request clashes with an existing record.
    #[display("{_0}")]
    Conflict(#[error(not(source))] String),
    /// The record's current state does not allow the change.
    #[display("{_0}")]
    Forbidden(#[error(not(source))] String),
    #[display("{_0}")]
    NotFound(#[error(not(source))] String),
    #[display("object store failure")]
    Storage,
    #[display("persistence failure")]
    Persistence,
    /// The record was written, but the importer was never told about it.
    #[display("failed to notify importer")]
    Notification,
    /// Every generated identifier collided with an existing record.
    #[display("identifier still colliding after {_0} attempts")]
    Collisions(#[error(not(source))] u32),
}

impl ErrorKind {
    /// HTTP status this failure is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Conflict(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Storage | Self::Persistence | Self::Notification | Self::Collisions(_) => 500,
        }
    }

    /// Whether the client can fix the request and try again.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Messages safe to show to a client.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Validation(violations) => violations.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}
