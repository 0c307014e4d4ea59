use exn::{OptionExt, ResultExt};
use interactives_db::error::{Constraint, ErrorKind as DbErrorKind};
use interactives_db::{Filter, Listing, Pagination, StoreHandle};
use interactives_models::{Archive, Interactive, InteractiveUpdate, Metadata, State, Violation, Violations};
use interactives_storage::{BackendHandle, content_key};
use interactives_upload::{Attachment, FILE_FIELD, FormData, METADATA_FIELD};
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::{Error, ErrorKind, Result};
use crate::ident::{Generators, slugify};
use crate::notify::{NotifierHandle, UploadedEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Bound on regenerating identifiers that collide with existing records.
    pub max_collisions: u32,
    /// Reject content already held by an active record.
    pub validate_sha: bool,
    /// Hide everything that is not published (read-only deployments).
    pub published_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { max_collisions: 10, validate_sha: true, published_only: false }
    }
}

/// Owns the interactive lifecycle: create, update, fetch, list and soft
/// delete.
///
/// Holds no state of its own between calls; everything lives behind the
/// persistence, storage and notifier handles.
pub struct Manager {
    storage: BackendHandle,
    store: StoreHandle,
    notifier: NotifierHandle,
    generators: Generators,
    settings: Settings,
}

impl Manager {
    pub fn new(storage: BackendHandle, store: StoreHandle, notifier: NotifierHandle, settings: Settings) -> Self {
        Self { storage, store, notifier, generators: Generators::default(), settings }
    }

    pub fn with_generators(mut self, generators: Generators) -> Self {
        self.generators = generators;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Catalog a freshly uploaded archive.
    ///
    /// The record is durably written before the importer is notified. If the
    /// notification fails the request still fails, and the record is marked
    /// [`State::ArchiveDispatchFailed`] on a best-effort basis.
    #[instrument(skip_all)]
    pub async fn create(&self, form: FormData) -> Result<Interactive> {
        let FormData { attachment, update } = form;
        let attachment =
            attachment.ok_or_raise(|| Self::invalid(FILE_FIELD, "expecting one attachment with metadata"))?;
        let metadata = update
            .and_then(|u| u.metadata)
            .ok_or_raise(|| Self::invalid(METADATA_FIELD, "missing mandatory key in form data"))?;
        if metadata.title.is_empty() {
            exn::bail!(Self::invalid(format!("{METADATA_FIELD}.metadata.title"), "required"));
        }

        self.ensure_unique_content(&attachment.sha, None).await?;
        if self.store.find_active_by_title(&metadata.title).await.or_raise(|| ErrorKind::Persistence)?.is_some() {
            exn::bail!(ErrorKind::Conflict(format!("interactive with title {:?} already exists", metadata.title)));
        }
        let key = self.upload(&attachment).await?;

        let current_files = attachment.archive.as_ref().map(|a| a.files.clone()).unwrap_or_default();
        let mut interactive = Interactive {
            id: String::new(),
            sha: attachment.sha.clone(),
            metadata: Metadata {
                slug: slugify(&metadata.label),
                resource_id: String::new(),
                ..metadata
            },
            archive: Archive {
                name: key.clone(),
                size_in_bytes: attachment.size,
                files: current_files,
                import_message: None,
            },
            state: State::ArchiveUploaded,
            active: true,
            published: false,
            last_updated: Some(OffsetDateTime::now_utc()),
        };
        self.insert_with_fresh_identifiers(&mut interactive).await?;
        tracing::info!(id = %interactive.id, sha = %interactive.sha, "created interactive");

        let event = UploadedEvent {
            id: interactive.id.clone(),
            path: key,
            title: interactive.metadata.title.clone(),
            collection_id: interactive.metadata.collection_id.clone(),
            current_files: interactive.archive.files.iter().map(|f| f.name.clone()).collect(),
        };
        if let Err(err) = self.notifier.publish(&event).await {
            tracing::warn!(id = %interactive.id, error = ?err, "could not notify importer");
            self.mark_dispatch_failed(&interactive).await;
            return Err(err.raise(ErrorKind::Notification));
        }
        Ok(interactive)
    }

    /// Apply an update: a replacement archive, metadata edits, an import
    /// result or a publish toggle.
    ///
    /// Title and identifiers always keep their stored values.
    #[instrument(skip(self, form))]
    pub async fn update(&self, id: &str, form: FormData) -> Result<Interactive> {
        let FormData { attachment, update } = form;
        let uploaded = match &attachment {
            Some(attachment) => {
                self.ensure_unique_content(&attachment.sha, Some(id)).await?;
                Some(self.upload(attachment).await?)
            },
            None => None,
        };

        let existing = self.find_active(id).await?;
        let mut record = existing.clone();
        if let Some(update) = update {
            Self::merge(&mut record, update)?;
        }
        if let (Some(attachment), Some(key)) = (&attachment, uploaded) {
            record.sha = attachment.sha.clone();
            record.archive.name = key;
            record.archive.size_in_bytes = attachment.size;
        }
        // Restore the immutable parts whatever the payload said.
        record.id = existing.id.clone();
        record.metadata.title = existing.metadata.title.clone();
        record.metadata.resource_id = existing.metadata.resource_id.clone();
        record.active = existing.active;
        record.last_updated = Some(OffsetDateTime::now_utc());

        self.store.upsert(&record).await.map_err(Self::write_error)?;
        tracing::info!(id = %record.id, state = %record.state, published = record.published, "updated interactive");
        Ok(record)
    }

    /// Fetch an active record.
    pub async fn get(&self, id: &str) -> Result<Interactive> {
        self.find_active(id).await
    }

    /// Active records matching `filter`, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self, mut filter: Filter, page: Pagination) -> Result<Listing> {
        filter.published_only |= self.settings.published_only;
        self.store.list(&filter, page).await.or_raise(|| ErrorKind::Persistence)
    }

    /// Soft delete: the record stays, flagged inactive.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<Interactive> {
        let mut record = self.find_active(id).await?;
        record.active = false;
        record.last_updated = Some(OffsetDateTime::now_utc());
        self.store.upsert(&record).await.map_err(Self::write_error)?;
        tracing::info!(id = %record.id, "deleted interactive");
        Ok(record)
    }

    fn invalid(field: impl Into<String>, message: impl Into<String>) -> ErrorKind {
        ErrorKind::Validation(Violations::from(vec![Violation::new(field, message)]))
    }

    fn not_found(id: &str) -> ErrorKind {
        ErrorKind::NotFound(format!("interactive {id} not found"))
    }

    async fn find_active(&self, id: &str) -> Result<Interactive> {
        let record = self.store.get(id).await.or_raise(|| ErrorKind::Persistence)?;
        match record {
            Some(record) if record.active && (record.published || !self.settings.published_only) => Ok(record),
            _ => exn::bail!(Self::not_found(id)),
        }
    }

    /// Content may only be held by one active record; `owner` is allowed to
    /// re-upload its own archive.
    async fn ensure_unique_content(&self, sha: &str, owner: Option<&str>) -> Result<()> {
        if !self.settings.validate_sha {
            return Ok(());
        }
        let holder = self.store.find_active_by_sha(sha).await.or_raise(|| ErrorKind::Persistence)?;
        match holder {
            Some(holder) if Some(holder.id.as_str()) != owner => {
                exn::bail!(ErrorKind::Conflict(format!("archive already uploaded as interactive {}", holder.id)))
            },
            _ => Ok(()),
        }
    }

    /// Store the archive under its content-addressed key.
    async fn upload(&self, attachment: &Attachment) -> Result<String> {
        let key = content_key(&attachment.sha, &attachment.file_name).or_raise(|| ErrorKind::Storage)?;
        self.storage.validate().await.or_raise(|| ErrorKind::Storage)?;
        let location = match self.storage.upload(attachment.path(), &key).await {
            Ok(location) => location,
            Err(err) => {
                tracing::warn!(key = %key.display(), retryable = err.is_retryable(), "archive upload failed");
                return Err(err.raise(ErrorKind::Storage));
            },
        };
        tracing::debug!(backend = self.storage.name(), %location, "uploaded archive");
        Ok(key.display().to_string())
    }

    /// Insert, regenerating the ID and resource ID whenever they collide.
    async fn insert_with_fresh_identifiers(&self, interactive: &mut Interactive) -> Result<()> {
        for attempt in 1..=self.settings.max_collisions {
            interactive.id = (self.generators.record_id)();
            interactive.metadata.resource_id = (self.generators.resource_id)();
            let err = match self.store.insert(interactive).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            match &*err {
                DbErrorKind::Duplicate(constraint) if err.is_retryable() => {
                    tracing::warn!(attempt, %constraint, "generated identifier collided, retrying");
                },
                _ => return Err(Self::write_error(err)),
            }
        }
        exn::bail!(ErrorKind::Collisions(self.settings.max_collisions))
    }

    #[track_caller]
    fn write_error(err: interactives_db::error::Error) -> Error {
        let kind = match &*err {
            DbErrorKind::Duplicate(Constraint::Sha) => {
                ErrorKind::Conflict("archive already uploaded as another interactive".to_string())
            },
            DbErrorKind::Duplicate(Constraint::Title) => {
                ErrorKind::Conflict("interactive with this title already exists".to_string())
            },
            _ => ErrorKind::Persistence,
        };
        err.raise(kind)
    }

    async fn mark_dispatch_failed(&self, interactive: &Interactive) {
        let Ok(state) = interactive.state.dispatched(false) else {
            return;
        };
        let mut failed = interactive.clone();
        failed.state = state;
        failed.last_updated = Some(OffsetDateTime::now_utc());
        if let Err(err) = self.store.upsert(&failed).await {
            tracing::error!(id = %interactive.id, error = ?err, "could not record dispatch failure");
        }
    }

    /// Fold a payload into a copy of the stored record.
    fn merge(record: &mut Interactive, update: InteractiveUpdate) -> Result<()> {
        if let Some(metadata) = update.metadata {
            let slug = if !metadata.label.is_empty() && metadata.label != record.metadata.label {
                record.metadata.label = metadata.label;
                slugify(&record.metadata.label)
            } else if !metadata.slug.is_empty() {
                slugify(&metadata.slug)
            } else {
                record.metadata.slug.clone()
            };
            if record.published && slug != record.metadata.slug {
                exn::bail!(ErrorKind::Forbidden("slug cannot change once published".to_string()));
            }
            record.metadata.slug = slug;
            if !metadata.internal_id.is_empty() {
                record.metadata.internal_id = metadata.internal_id;
            }
            if let Some(collection_id) = metadata.collection_id
                && record.metadata.collection_id.as_ref() != Some(&collection_id)
            {
                if record.published {
                    exn::bail!(ErrorKind::Forbidden("published interactives cannot join a collection".to_string()));
                }
                record.metadata.collection_id = Some(collection_id);
            }
        }

        if let Some(archive) = update.archive {
            if let Some(files) = archive.files {
                record.archive.files = files;
            }
            if let Some(message) = archive.import_message {
                record.archive.import_message = Some(message);
            }
            if let Some(success) = archive.import_successful {
                let from = record.state;
                record.state = from
                    .imported(success)
                    .or_raise(|| ErrorKind::Conflict(format!("import result cannot change a {from} interactive")))?;
            }
        }

        match update.published {
            Some(true) if !record.published => {
                if !record.state.can_publish() {
                    exn::bail!(ErrorKind::Forbidden(format!("cannot publish an interactive in state {}", record.state)));
                }
                record.published = true;
                record.metadata.collection_id = None;
            },
            Some(false) if record.published => {
                exn::bail!(ErrorKind::Forbidden("a published interactive cannot be unpublished".to_string()));
            },
            _ => {},
        }
        Ok(())
    }
}
