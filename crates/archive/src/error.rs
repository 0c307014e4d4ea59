//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive inspection error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive inspection.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The archive holds no renderable page.
    #[display("interactive must contain 1 htm(l) file")]
    NoIndexHtml,
    /// The bytes are not a readable zip archive.
    #[display("invalid zip archive: {_0}")]
    InvalidZip(#[error(not(source))] String),
    /// Reading the underlying stream failed.
    #[display("I/O error while reading archive")]
    Io,
}
