//! Object storage for uploaded archives.
//!
//! Archives are written under content-addressed keys (`{sha}/{file name}`)
//! through the [`StorageBackend`] trait. Which backend sits behind a
//! [`BackendHandle`] is decided by configuration.

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::path::{content_key, validate as validate_path};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
