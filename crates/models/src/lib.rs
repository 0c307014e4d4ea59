//! Domain model for interactives.
//!
//! An interactive is an uploaded zip of HTML/CSS/JS, the metadata describing
//! it, and the import [`State`] it has reached. The persisted shape is
//! [`Interactive`]; requests carry an [`InteractiveUpdate`]; responses are
//! rendered from an [`InteractiveView`].

pub mod error;
mod interactive;
mod state;
mod update;
mod view;
mod violation;

pub use crate::interactive::{Archive, HtmlFile, Interactive, Metadata};
pub use crate::state::State;
pub use crate::update::{ArchiveUpdate, InteractiveUpdate};
pub use crate::view::InteractiveView;
pub use crate::violation::{Violation, Violations};
