//! Request-side shapes.
//!
//! Every field is optional so that "not supplied" can be told apart from
//! "supplied as false/empty" when merging into a stored record.

use serde::Deserialize;

use crate::interactive::{HtmlFile, Metadata};
use crate::violation::Violation;

/// JSON side-channel of an upload or update request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InteractiveUpdate {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub archive: Option<ArchiveUpdate>,
}

/// Import results reported back by the importer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArchiveUpdate {
    #[serde(default)]
    pub files: Option<Vec<HtmlFile>>,
    #[serde(default)]
    pub import_message: Option<String>,
    #[serde(default)]
    pub import_successful: Option<bool>,
}

impl InteractiveUpdate {
    pub fn normalize(&mut self) {
        if let Some(metadata) = self.metadata.as_mut() {
            metadata.normalize();
        }
        if let Some(archive) = self.archive.as_mut() {
            archive.import_message = archive
                .import_message
                .take()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty());
        }
    }

    /// Structural validation of the normalized payload, scoped under `field`.
    pub fn violations(&self, field: &str) -> Vec<Violation> {
        match &self.metadata {
            Some(metadata) => metadata.violations(&format!("{field}.metadata")),
            None => Vec::new(),
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.title.as_str())
    }
}
