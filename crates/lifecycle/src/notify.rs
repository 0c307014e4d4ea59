//! Outbound notification that an archive is waiting to be imported.

use async_trait::async_trait;
use exn::ResultExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{ErrorKind, Result};

/// Emitted once per successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedEvent {
    pub id: String,
    /// Storage key of the archive.
    pub path: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    /// HTML pages found in the archive at upload time.
    pub current_files: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &UploadedEvent) -> Result<()>;
}

pub type NotifierHandle = Arc<dyn Notifier + Send + Sync>;

/// Hands serialized events to an in-process consumer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<Vec<u8>>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn publish(&self, event: &UploadedEvent) -> Result<()> {
        let payload = serde_json::to_vec(event).or_raise(|| ErrorKind::Notification)?;
        self.sender.send(payload).await.or_raise(|| ErrorKind::Notification)?;
        tracing::debug!(id = %event.id, path = %event.path, "queued uploaded event");
        Ok(())
    }
}
