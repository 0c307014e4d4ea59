//! In-memory persistence for testing.

use crate::error::{Constraint, ErrorKind, Result};
use crate::store::{Filter, Listing, Pagination, Persistence};
use async_trait::async_trait;
use interactives_models::Interactive;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;

/// In-memory [`Persistence`] with the same uniqueness rules as the SQLite
/// repository, plus scripted write failures.
///
/// # Examples
///
/// ```
/// use interactives_db::{MockRepository, error::{Constraint, ErrorKind}};
///
/// let repo = MockRepository::default();
/// // The next two writes collide on the resource ID, the third goes through.
/// repo.fail_next_writes(ErrorKind::Duplicate(Constraint::ResourceId), 2);
/// ```
#[derive(Default)]
pub struct MockRepository {
    records: RwLock<Vec<Interactive>>,
    failures: Mutex<VecDeque<ErrorKind>>,
}

impl MockRepository {
    pub fn with_records(records: impl IntoIterator<Item = Interactive>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().collect()),
            failures: Mutex::default(),
        }
    }

    /// Fail the next `times` calls to `insert`/`upsert` with `kind`.
    pub fn fail_next_writes(&self, kind: ErrorKind, times: usize) {
        self.failures().extend(std::iter::repeat_n(kind, times));
    }

    /// Number of scripted failures not yet consumed.
    pub fn pending_failures(&self) -> usize {
        self.failures().len()
    }

    /// Snapshot of every stored record, including soft-deleted ones.
    pub async fn records(&self) -> Vec<Interactive> {
        self.records.read().await.clone()
    }

    fn failures(&self) -> MutexGuard<'_, VecDeque<ErrorKind>> {
        // A panicking test thread must not hide the script from the others.
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scripted_failure(&self) -> Result<()> {
        let next = self.failures().pop_front();
        match next {
            Some(kind) => exn::bail!(kind),
            None => Ok(()),
        }
    }

    fn check_unique(records: &[Interactive], candidate: &Interactive, replacing: Option<usize>) -> Result<()> {
        for (index, existing) in records.iter().enumerate() {
            if Some(index) == replacing {
                continue;
            }
            if existing.metadata.resource_id == candidate.metadata.resource_id {
                exn::bail!(ErrorKind::Duplicate(Constraint::ResourceId));
            }
            if existing.active && candidate.active {
                if existing.sha == candidate.sha {
                    exn::bail!(ErrorKind::Duplicate(Constraint::Sha));
                }
                if existing.metadata.title == candidate.metadata.title {
                    exn::bail!(ErrorKind::Duplicate(Constraint::Title));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Persistence for MockRepository {
    async fn get(&self, id: &str) -> Result<Option<Interactive>> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, filter: &Filter, page: Pagination) -> Result<Listing> {
        let records = self.records.read().await;
        let matching: Vec<&Interactive> = records.iter().rev().filter(|r| filter.matches(r)).collect();
        Ok(Listing {
            total: matching.len() as u64,
            items: matching
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .cloned()
                .collect(),
        })
    }

    async fn insert(&self, interactive: &Interactive) -> Result<()> {
        self.scripted_failure()?;
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == interactive.id) {
            exn::bail!(ErrorKind::Duplicate(Constraint::Id));
        }
        Self::check_unique(&records, interactive, None)?;
        records.push(interactive.clone());
        Ok(())
    }

    async fn upsert(&self, interactive: &Interactive) -> Result<()> {
        self.scripted_failure()?;
        let mut records = self.records.write().await;
        let position = records.iter().position(|r| r.id == interactive.id);
        Self::check_unique(&records, interactive, position)?;
        match position {
            Some(index) => records[index] = interactive.clone(),
            None => records.push(interactive.clone()),
        }
        Ok(())
    }

    async fn find_active_by_sha(&self, sha: &str) -> Result<Option<Interactive>> {
        Ok(self.records.read().await.iter().find(|r| r.active && r.sha == sha).cloned())
    }

    async fn find_active_by_title(&self, title: &str) -> Result<Option<Interactive>> {
        Ok(self.records.read().await.iter().find(|r| r.active && r.metadata.title == title).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interactives_models::{Archive, Metadata, State};

    fn interactive(id: &str, sha: &str, title: &str, resource_id: &str) -> Interactive {
        Interactive {
            id: id.to_string(),
            sha: sha.to_string(),
            metadata: Metadata {
                title: title.to_string(),
                resource_id: resource_id.to_string(),
                ..Default::default()
            },
            archive: Archive::default(),
            state: State::ArchiveUploaded,
            active: true,
            published: false,
            last_updated: None,
        }
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let repo = MockRepository::default();
        repo.fail_next_writes(ErrorKind::Duplicate(Constraint::Id), 1);
        repo.fail_next_writes(ErrorKind::Database, 1);
        let record = interactive("id1", "sha1", "t1", "rid1");
        assert_eq!(*repo.insert(&record).await.unwrap_err(), ErrorKind::Duplicate(Constraint::Id));
        assert_eq!(*repo.insert(&record).await.unwrap_err(), ErrorKind::Database);
        repo.insert(&record).await.unwrap();
        assert_eq!(repo.pending_failures(), 0);
    }

    #[tokio::test]
    async fn test_uniqueness_matches_schema() {
        let repo = MockRepository::with_records([interactive("id1", "sha1", "t1", "rid1")]);
        let err = repo.insert(&interactive("id2", "sha1", "t2", "rid2")).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Duplicate(Constraint::Sha));
        let err = repo.insert(&interactive("id2", "sha2", "t1", "rid2")).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Duplicate(Constraint::Title));
        let err = repo.insert(&interactive("id1", "sha2", "t2", "rid2")).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Duplicate(Constraint::Id));

        let mut deleted = repo.get("id1").await.unwrap().unwrap();
        deleted.active = false;
        repo.upsert(&deleted).await.unwrap();
        repo.insert(&interactive("id2", "sha1", "t1", "rid2")).await.unwrap();
    }
}
