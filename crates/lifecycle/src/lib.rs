//! Lifecycle of an interactive, from upload to publication.
//!
//! [`Manager`] ties persistence, archive storage and importer notification
//! together. Transport concerns (multipart parsing, HTTP status mapping) stay
//! with the caller; every failure surfaces as an [`error::ErrorKind`] that
//! knows its own status code.

pub mod error;
mod ident;
mod manager;
mod notify;

pub use crate::ident::{Generators, RESOURCE_ID_LENGTH, record_id, resource_id, slugify};
pub use crate::manager::{Manager, Settings};
pub use crate::notify::{ChannelNotifier, Notifier, NotifierHandle, UploadedEvent};
