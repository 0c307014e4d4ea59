//! Multipart validation for interactive uploads and updates.
//!
//! A request carries at most one zip attachment and a JSON side-channel field
//! named `interactive`. The [`Validator`] streams the attachment to a scoped
//! temporary file, fingerprints it, checks the request against the call
//! site's [`Expectations`] and reports every problem at once.

pub mod error;
mod form;
pub mod policy;

pub use crate::form::{Attachment, Expectations, FILE_FIELD, FormData, Limits, METADATA_FIELD, Validator};
pub use crate::policy::{AttachmentRule, FormShape};
