use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::State;
use crate::violation::Violation;

/// An uploaded archive bundle, its metadata and where it is in the import
/// lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interactive {
    /// Assigned once at creation.
    pub id: String,
    /// Content fingerprint of the uploaded archive.
    pub sha: String,
    pub metadata: Metadata,
    pub archive: Archive,
    pub state: State,
    /// Soft-delete flag.
    pub active: bool,
    /// Once set, the slug and resource ID (and so the public URL) are frozen.
    pub published: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
}

impl Interactive {
    /// Public path segment: `/interactives/{slug}-{resource_id}`.
    ///
    /// A sparse (empty) slug collapses to just the resource ID.
    pub fn uri(&self) -> String {
        match self.metadata.slug.is_empty() {
            true => format!("/interactives/{}", self.metadata.resource_id),
            false => format!("/interactives/{}-{}", self.metadata.slug, self.metadata.resource_id),
        }
    }

    /// Embeddable preview URL rooted at `domain`.
    pub fn url(&self, domain: &str) -> String {
        format!("{}{}/embed", domain.trim_end_matches('/'), self.uri())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Natural key. Immutable after creation.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub internal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    /// Derived from the label.
    #[serde(default)]
    pub slug: String,
    /// Allocated once at creation.
    #[serde(default)]
    pub resource_id: String,
}

impl Metadata {
    /// Canonicalize user-supplied strings before they are validated.
    pub fn normalize(&mut self) {
        for field in [
            &mut self.title,
            &mut self.label,
            &mut self.internal_id,
            &mut self.slug,
            &mut self.resource_id,
        ] {
            let trimmed = field.trim();
            if trimmed.len() != field.len() {
                *field = trimmed.to_string();
            }
        }
        self.collection_id = self
            .collection_id
            .take()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
    }

    /// Structural checks, reported against fields under `prefix`.
    ///
    /// Title, label and internal ID are required, and the latter two must be
    /// ASCII alphanumeric.
    pub fn violations(&self, prefix: &str) -> Vec<Violation> {
        let mut found = Vec::new();
        let field = |name: &str| format!("{prefix}.{name}");
        if self.title.is_empty() {
            found.push(Violation::new(field("title"), "required"));
        }
        for (name, value) in [("label", &self.label), ("internal_id", &self.internal_id)] {
            if value.is_empty() {
                found.push(Violation::new(field(name), "required"));
            } else if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
                found.push(Violation::new(field(name), "alphanum"));
            }
        }
        found
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    /// Storage key of the uploaded zip.
    pub name: String,
    pub size_in_bytes: u64,
    /// HTML entries. Filled from the upload as a preview hint, later replaced
    /// by the importer's authoritative list.
    #[serde(default)]
    pub files: Vec<HtmlFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlFile {
    /// Base name of the entry.
    pub name: String,
    /// Full path of the entry inside the archive.
    pub uri: String,
    #[serde(default)]
    pub size_in_bytes: u64,
}
