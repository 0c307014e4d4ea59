use serde::Serialize;
use time::OffsetDateTime;

use crate::{Archive, HtmlFile, Interactive, Metadata, State};

/// Outward representation of an [`Interactive`].
///
/// Hides the content fingerprint and the soft-delete flag, and adds the
/// derived public links.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractiveView {
    pub id: String,
    pub metadata: Metadata,
    pub archive: Archive,
    pub published: bool,
    pub state: State,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
    pub uri: String,
    pub url: String,
}

impl InteractiveView {
    pub fn new(interactive: Interactive, domain: &str) -> Self {
        let uri = interactive.uri();
        let url = interactive.url(domain);
        let mut archive = interactive.archive;
        archive.files = archive
            .files
            .into_iter()
            .map(|file| HtmlFile {
                uri: format!("{}/{}", uri, file.uri.trim_start_matches('/')),
                ..file
            })
            .collect();
        Self {
            id: interactive.id,
            metadata: interactive.metadata,
            archive,
            published: interactive.published,
            state: interactive.state,
            last_updated: interactive.last_updated,
            uri,
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_hides_internals_and_prefixes_files() {
        let interactive = Interactive {
            id: "0f3c".to_string(),
            sha: "secret-sha".to_string(),
            metadata: Metadata {
                title: "t1".to_string(),
                label: "label1".to_string(),
                slug: "label1".to_string(),
                resource_id: "abcd1234".to_string(),
                ..Default::default()
            },
            archive: Archive {
                name: "sha/bundle.zip".to_string(),
                size_in_bytes: 10,
                files: vec![HtmlFile {
                    name: "index.html".to_string(),
                    uri: "site/index.html".to_string(),
                    size_in_bytes: 5,
                }],
                import_message: None,
            },
            state: State::ImportSuccess,
            active: true,
            published: true,
            last_updated: None,
        };
        let view = InteractiveView::new(interactive, "https://example.com");
        assert_eq!(view.archive.files[0].uri, "/interactives/label1-abcd1234/site/index.html");
        assert_eq!(view.url, "https://example.com/interactives/label1-abcd1234/embed");
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("sha").is_none());
        assert!(json.get("active").is_none());
        assert_eq!(json["state"], "ImportSuccess");
    }
}
