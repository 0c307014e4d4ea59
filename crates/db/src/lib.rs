//! SQLite persistence for interactive records.
//!
//! Records are stored as a JSON document alongside the columns that are
//! filtered on or must be unique. Soft-deleted records stay in the table with
//! `active = 0` and no longer count towards the SHA and title uniqueness
//! rules.
//!
//! Consumers depend on the [`Persistence`] trait; [`Repository`] is the
//! SQLite implementation and `MockRepository` (behind the `mock` feature) an
//! in-memory one for tests.

mod db;
pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod repo;
mod row;
mod store;

pub use crate::db::Database;
#[cfg(feature = "mock")]
pub use crate::mock::MockRepository;
pub use crate::repo::Repository;
pub use crate::store::{Filter, Listing, Pagination, Persistence, StoreHandle};
