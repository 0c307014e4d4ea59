use async_trait::async_trait;
use interactives_models::Interactive;
use std::sync::Arc;

use crate::error::Result;

pub type StoreHandle = Arc<dyn Persistence + Send + Sync>;

/// Narrowing applied to [`Persistence::list`]. Only active records are ever
/// listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub resource_id: Option<String>,
    /// Records linked to this collection, plus everything already published.
    pub collection_id: Option<String>,
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub published_only: bool,
}

impl Filter {
    /// In-memory equivalent of the SQL filter.
    pub fn matches(&self, interactive: &Interactive) -> bool {
        let metadata = &interactive.metadata;
        interactive.active
            && (!self.published_only || interactive.published)
            && self.resource_id.as_ref().is_none_or(|r| *r == metadata.resource_id)
            && self
                .collection_id
                .as_ref()
                .is_none_or(|c| interactive.published || metadata.collection_id.as_ref() == Some(c))
            && self
                .title
                .as_ref()
                .is_none_or(|t| metadata.title.to_lowercase().contains(&t.to_lowercase()))
    }
}

/// A window onto a filtered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u32,
    pub limit: u32,
}

/// One page of results plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub items: Vec<Interactive>,
    pub total: u64,
}

/// Storage of interactive records, keyed by ID.
///
/// Implementations enforce uniqueness themselves: `id` and `resource_id`
/// globally, `sha` and `title` among active records. A write that would break
/// one of these fails with [`ErrorKind::Duplicate`](crate::error::ErrorKind::Duplicate).
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Fetch a record regardless of its active flag.
    async fn get(&self, id: &str) -> Result<Option<Interactive>>;

    /// Active records matching `filter`, newest first.
    async fn list(&self, filter: &Filter, page: Pagination) -> Result<Listing>;

    /// Write a new record. Fails if the ID is already taken.
    async fn insert(&self, interactive: &Interactive) -> Result<()>;

    /// Write a record, replacing any existing record with the same ID.
    async fn upsert(&self, interactive: &Interactive) -> Result<()>;

    async fn find_active_by_sha(&self, sha: &str) -> Result<Option<Interactive>>;

    async fn find_active_by_title(&self, title: &str) -> Result<Option<Interactive>>;
}
