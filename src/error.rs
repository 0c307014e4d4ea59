//! Service Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A start-up or serving error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for the service binary.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open database")]
    Database,
    #[display("could not set up storage backend")]
    Storage,
    /// The configured storage type was left out of this build.
    #[cfg(not(feature = "s3"))]
    #[display("storage type {_0:?} is not supported by this build")]
    Unsupported(#[error(not(source))] &'static str),
    #[display("could not listen on {_0}")]
    Bind(#[error(not(source))] String),
    #[display("server stopped unexpectedly")]
    Serve,
}
