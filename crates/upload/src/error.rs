//! Upload Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use interactives_models::Violations;

/// An upload validation error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upload validation.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request is unacceptable; every problem found is listed.
    #[display("invalid form data: {_0}")]
    Invalid(#[error(not(source))] Violations),
    /// Spooling the attachment to scratch space failed.
    #[display("could not spool attachment")]
    Io,
    /// Archive inspection did not run to completion.
    #[display("archive inspection aborted")]
    Aborted,
}

impl ErrorKind {
    /// Violations to report back to the client, if the request itself was at fault.
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::Invalid(violations) => Some(violations),
            _ => None,
        }
    }
}
