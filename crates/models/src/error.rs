//! Model Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use crate::State;
use derive_more::{Display, Error};

/// A model error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A persisted or supplied state name does not map to any known state.
    #[display("unknown interactive state: {_0}")]
    UnknownState(#[error(not(source))] String),
    /// The state machine does not allow moving between these two states.
    #[display("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// State the record is currently in.
        from: State,
        /// State the caller asked for.
        to: State,
    },
}
