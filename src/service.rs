//! Wiring of configuration into collaborators.

use exn::ResultExt;
use interactives_config::{Config, StorageConfig};
use interactives_db::{Database, Repository};
use interactives_lifecycle::{ChannelNotifier, Manager, Settings};
use interactives_storage::BackendHandle;
use interactives_storage::backend::LocalBackend;
use interactives_upload::{Limits, Validator};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ErrorKind, Result};
use crate::http::AppState;

/// Pending importer events; the dispatcher applies back-pressure beyond this.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Everything the HTTP layer needs, plus the handles to shut down cleanly.
pub struct Service {
    pub state: AppState,
    pub database: Database,
    pub dispatcher: JoinHandle<()>,
}

impl Service {
    pub async fn build(config: &Config) -> Result<Self> {
        if let Some(parent) = config.database.path.parent() {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
        }
        let database = Database::connect(&config.database.path).await.or_raise(|| ErrorKind::Database)?;
        let storage = storage_backend(&config.storage).await?;
        let (notifier, events) = ChannelNotifier::new(EVENT_QUEUE_CAPACITY);
        let dispatcher = tokio::spawn(dispatch(events));

        let settings = Settings {
            max_collisions: config.max_collisions,
            validate_sha: config.validate_sha,
            published_only: !config.publishing_enabled,
        };
        let manager = Manager::new(storage, Arc::new(Repository::from(&database)), Arc::new(notifier), settings);
        let validator = Validator::new(Limits {
            max_upload_size_mb: config.max_upload_size_mb,
            scratch_dir: config.scratch_dir.clone(),
            ..Limits::default()
        });
        let state = AppState {
            manager: Arc::new(manager),
            validator: Arc::new(validator),
            site_domain: config.site_domain.clone().into(),
            pagination: config.pagination,
            publishing_enabled: config.publishing_enabled,
        };
        Ok(Self { state, database, dispatcher })
    }
}

async fn storage_backend(config: &StorageConfig) -> Result<BackendHandle> {
    match config {
        StorageConfig::Local { root } => {
            let root = absolute(root).or_raise(|| ErrorKind::Storage)?;
            let backend = LocalBackend::new("local", root).or_raise(|| ErrorKind::Storage)?;
            Ok(Arc::new(backend))
        },
        #[cfg(feature = "s3")]
        StorageConfig::S3 { bucket, prefix, region, endpoint, key_id, key_secret } => {
            let backend = interactives_storage::backend::S3Backend::new(
                "s3",
                bucket,
                prefix.clone(),
                region,
                endpoint.clone(),
                key_id,
                key_secret,
            )
            .await
            .or_raise(|| ErrorKind::Storage)?;
            Ok(Arc::new(backend))
        },
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3 { .. } => exn::bail!(ErrorKind::Unsupported("s3")),
    }
}

/// Relative storage roots are taken relative to the working directory.
fn absolute(path: &Path) -> std::io::Result<std::path::PathBuf> {
    match path.is_absolute() {
        true => Ok(path.to_path_buf()),
        false => Ok(std::env::current_dir()?.join(path)),
    }
}

/// Drain importer events. The transport to the importer lives elsewhere;
/// here every event is logged.
async fn dispatch(mut events: mpsc::Receiver<Vec<u8>>) {
    while let Some(payload) = events.recv().await {
        match serde_json::from_slice::<serde_json::Value>(&payload) {
            Ok(event) => tracing::info!(%event, "interactive uploaded, awaiting import"),
            Err(err) => tracing::warn!(error = %err, "undecodable importer event"),
        }
    }
    tracing::debug!("importer event queue closed");
}
