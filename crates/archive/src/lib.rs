//! Zip inspection for uploaded interactives.
//!
//! Opening an archive enumerates its entries and reports the HTML pages a
//! preview could render. It has no side effects.

pub mod error;
mod inspect;

pub use crate::inspect::{open, open_reader};
