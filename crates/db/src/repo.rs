//! SQLite-backed [`Persistence`].

use crate::Database;
use crate::error::{Constraint, ErrorKind, Result};
use crate::row::InteractiveRow;
use crate::store::{Filter, Listing, Pagination, Persistence};
use async_trait::async_trait;
use exn::ResultExt;
use interactives_models::Interactive;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::instrument;

/// Repository for interactive records.
///
/// Each record is a JSON document plus the handful of columns that are
/// filtered on or carry a uniqueness constraint. Uniqueness is enforced by
/// the schema's (partial) unique indexes, so concurrent writers cannot both
/// claim the same SHA, title or identifier.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Which uniqueness rule a failed write broke, if that is why it failed.
    fn broken_constraint(err: &sqlx::Error) -> Option<Constraint> {
        match err {
            sqlx::Error::Database(db_err) if db_err.kind() == sqlx::error::ErrorKind::UniqueViolation => {
                Constraint::from_sqlite_message(db_err.message())
            },
            _ => None,
        }
    }

    async fn write(&self, query: &'static str, interactive: &Interactive) -> Result<()> {
        let row = InteractiveRow::try_from(interactive)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let result = sqlx::query(query)
            .bind(row.id)
            .bind(row.sha)
            .bind(row.title)
            .bind(row.resource_id)
            .bind(row.collection_id)
            .bind(row.state)
            .bind(row.active)
            .bind(row.published)
            .bind(row.document)
            .bind(now)
            .bind(row.last_updated)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => match Self::broken_constraint(&err) {
                Some(constraint) => exn::bail!(ErrorKind::Duplicate(constraint)),
                None => Err::<(), _>(err).or_raise(|| ErrorKind::Database),
            },
        }
    }

    async fn fetch_one(&self, query: &'static str, key: &str) -> Result<Option<Interactive>> {
        let row: Option<InteractiveRow> = sqlx::query_as(query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Interactive::try_from).transpose()
    }
}

#[async_trait]
impl Persistence for Repository {
    async fn get(&self, id: &str) -> Result<Option<Interactive>> {
        self.fetch_one(include_str!("../queries/get_by_id.sql"), id).await
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &Filter, page: Pagination) -> Result<Listing> {
        let rows: Vec<InteractiveRow> = sqlx::query_as(include_str!("../queries/list.sql"))
            .bind(filter.resource_id.as_deref())
            .bind(filter.collection_id.as_deref())
            .bind(filter.title.as_deref())
            .bind(filter.published_only)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let total: i64 = sqlx::query_scalar(include_str!("../queries/count.sql"))
            .bind(filter.resource_id.as_deref())
            .bind(filter.collection_id.as_deref())
            .bind(filter.title.as_deref())
            .bind(filter.published_only)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Listing {
            items: rows.into_iter().map(Interactive::try_from).collect::<Result<Vec<_>>>()?,
            total: u64::try_from(total).or_raise(|| ErrorKind::InvalidData("count"))?,
        })
    }

    #[instrument(skip(self, interactive), fields(id = %interactive.id))]
    async fn insert(&self, interactive: &Interactive) -> Result<()> {
        self.write(include_str!("../queries/insert.sql"), interactive).await
    }

    #[instrument(skip(self, interactive), fields(id = %interactive.id))]
    async fn upsert(&self, interactive: &Interactive) -> Result<()> {
        self.write(include_str!("../queries/upsert.sql"), interactive).await
    }

    async fn find_active_by_sha(&self, sha: &str) -> Result<Option<Interactive>> {
        self.fetch_one(include_str!("../queries/find_active_by_sha.sql"), sha).await
    }

    async fn find_active_by_title(&self, title: &str) -> Result<Option<Interactive>> {
        self.fetch_one(include_str!("../queries/find_active_by_title.sql"), title).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interactives_models::{Archive, Metadata, State};
    use rstest::rstest;

    async fn repo() -> Repository {
        Repository::from(&Database::connect_in_memory().await.unwrap())
    }

    fn interactive(id: &str, sha: &str, title: &str, resource_id: &str) -> Interactive {
        Interactive {
            id: id.to_string(),
            sha: sha.to_string(),
            metadata: Metadata {
                title: title.to_string(),
                label: "label1".to_string(),
                internal_id: "int1".to_string(),
                collection_id: None,
                slug: "label1".to_string(),
                resource_id: resource_id.to_string(),
            },
            archive: Archive {
                name: format!("{sha}/bundle.zip"),
                size_in_bytes: 42,
                files: Vec::new(),
                import_message: None,
            },
            state: State::ArchiveUploaded,
            active: true,
            published: false,
            last_updated: None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = repo().await;
        let record = interactive("id1", "sha1", "t1", "rid00001");
        repo.insert(&record).await.unwrap();
        let found = repo.get("id1").await.unwrap().unwrap();
        assert_eq!(found.metadata, record.metadata);
        assert_eq!(found.archive, record.archive);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[rstest]
    #[case(interactive("id1", "sha2", "t2", "rid00002"), Constraint::Id)]
    #[case(interactive("id2", "sha2", "t2", "rid00001"), Constraint::ResourceId)]
    #[case(interactive("id2", "sha1", "t2", "rid00002"), Constraint::Sha)]
    #[case(interactive("id2", "sha2", "t1", "rid00002"), Constraint::Title)]
    #[tokio::test]
    async fn test_insert_duplicate(#[case] second: Interactive, #[case] expected: Constraint) {
        let repo = repo().await;
        repo.insert(&interactive("id1", "sha1", "t1", "rid00001")).await.unwrap();
        let err = repo.insert(&second).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Duplicate(expected));
    }

    #[tokio::test]
    async fn test_soft_deleted_frees_sha_and_title() {
        let repo = repo().await;
        let mut first = interactive("id1", "sha1", "t1", "rid00001");
        repo.insert(&first).await.unwrap();
        first.active = false;
        repo.upsert(&first).await.unwrap();
        assert!(repo.find_active_by_sha("sha1").await.unwrap().is_none());
        assert!(repo.find_active_by_title("t1").await.unwrap().is_none());
        repo.insert(&interactive("id2", "sha1", "t1", "rid00002")).await.unwrap();
        assert_eq!(repo.find_active_by_sha("sha1").await.unwrap().unwrap().id, "id2");
        // The deleted record is still there.
        assert!(!repo.get("id1").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let repo = repo().await;
        let mut record = interactive("id1", "sha1", "t1", "rid00001");
        repo.upsert(&record).await.unwrap();
        record.state = State::ImportSuccess;
        record.published = true;
        repo.upsert(&record).await.unwrap();
        let found = repo.get("id1").await.unwrap().unwrap();
        assert_eq!(found.state, State::ImportSuccess);
        assert!(found.published);
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let repo = repo().await;
        for n in 1..=5 {
            let mut record = interactive(&format!("id{n}"), &format!("sha{n}"), &format!("Title {n}"), &format!("rid0000{n}"));
            record.metadata.collection_id = (n % 2 == 0).then(|| "col".to_string());
            record.published = n == 5;
            repo.insert(&record).await.unwrap();
        }
        let mut deleted = interactive("id9", "sha9", "Title 9", "rid00009");
        deleted.active = false;
        repo.insert(&deleted).await.unwrap();

        let all = repo.list(&Filter::default(), Pagination { offset: 0, limit: 10 }).await.unwrap();
        assert_eq!(all.total, 5);
        assert_eq!(all.items.len(), 5);

        let page = repo.list(&Filter::default(), Pagination { offset: 1, limit: 2 }).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);

        let collection = Filter { collection_id: Some("col".to_string()), ..Default::default() };
        let linked = repo.list(&collection, Pagination { offset: 0, limit: 10 }).await.unwrap();
        let mut ids: Vec<_> = linked.items.iter().map(|i| i.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["id2", "id4", "id5"]);

        let by_title = Filter { title: Some("title 3".to_string()), ..Default::default() };
        assert_eq!(repo.list(&by_title, Pagination { offset: 0, limit: 10 }).await.unwrap().total, 1);

        let published = Filter { published_only: true, ..Default::default() };
        assert_eq!(repo.list(&published, Pagination { offset: 0, limit: 10 }).await.unwrap().items[0].id, "id5");

        let by_resource = Filter { resource_id: Some("rid00004".to_string()), ..Default::default() };
        assert_eq!(repo.list(&by_resource, Pagination { offset: 0, limit: 10 }).await.unwrap().items[0].id, "id4");
    }
}
