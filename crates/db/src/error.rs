//! Persistence Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A persistence error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for persistence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Uniqueness rule that a write broke.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    #[display("id")]
    Id,
    #[display("resource_id")]
    ResourceId,
    #[display("active sha")]
    Sha,
    #[display("active title")]
    Title,
}

impl Constraint {
    /// Parse the column out of SQLite's `UNIQUE constraint failed: table.column` message.
    pub(crate) fn from_sqlite_message(message: &str) -> Option<Self> {
        let column = message.rsplit("interactives.").next()?.trim();
        match column {
            "id" => Some(Self::Id),
            "resource_id" => Some(Self::ResourceId),
            "sha" => Some(Self::Sha),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    /// Collisions on generated identifiers can be resolved by generating new ones.
    pub fn is_identifier(&self) -> bool {
        matches!(self, Self::Id | Self::ResourceId)
    }
}

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A write would break a uniqueness rule.
    #[display("duplicate key: {_0}")]
    Duplicate(#[error(not(source))] Constraint),
    /// Serialization/deserialization error.
    #[display("invalid persisted data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Duplicate(c) if c.is_identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("UNIQUE constraint failed: interactives.id", Some(Constraint::Id))]
    #[case("UNIQUE constraint failed: interactives.resource_id", Some(Constraint::ResourceId))]
    #[case("UNIQUE constraint failed: interactives.sha", Some(Constraint::Sha))]
    #[case("UNIQUE constraint failed: interactives.title", Some(Constraint::Title))]
    #[case("NOT NULL constraint failed: interactives.document", None)]
    fn test_constraint_from_message(#[case] message: &str, #[case] expected: Option<Constraint>) {
        assert_eq!(Constraint::from_sqlite_message(message), expected);
    }

    #[test]
    fn test_only_identifier_collisions_are_retryable() {
        assert!(ErrorKind::Duplicate(Constraint::ResourceId).is_retryable());
        assert!(!ErrorKind::Duplicate(Constraint::Sha).is_retryable());
        assert!(!ErrorKind::Database.is_retryable());
    }
}
