//! Identifier and slug generation.

use rand::distr::{Alphanumeric, SampleString};
use regex::Regex;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

pub const RESOURCE_ID_LENGTH: usize = 8;

static ARTICLES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(a|an|and|the)\b").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Short public identifier: 8 characters of `[0-9A-Za-z]`.
///
/// Random, so only probabilistically unique. Uniqueness is enforced by
/// persistence.
pub fn resource_id() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), RESOURCE_ID_LENGTH)
}

/// Opaque record identifier.
pub fn record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Hyphenated, lower-case, article-free form of a title or label.
///
/// Idempotent, and may return an empty string.
pub fn slugify(title: &str) -> String {
    let mut stripped = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            c if c.is_whitespace() || c == '-' => stripped.push(' '),
            // Lower-casing may expand to combining marks (`İ` -> `i\u{307}`).
            c => stripped.extend(c.to_lowercase().filter(|l| l.is_alphanumeric())),
        }
    }
    let without_articles = ARTICLES.replace_all(&stripped, "");
    WHITESPACE.replace_all(without_articles.trim(), "-").into_owned()
}

type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// Identifier sources used by the lifecycle manager.
#[derive(Clone)]
pub struct Generators {
    pub record_id: Generator,
    pub resource_id: Generator,
}

impl Default for Generators {
    fn default() -> Self {
        Self { record_id: Arc::new(record_id), resource_id: Arc::new(resource_id) }
    }
}

impl Debug for Generators {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Generators").finish_non_exhaustive()
    }
}
