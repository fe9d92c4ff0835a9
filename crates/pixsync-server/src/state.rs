//! Shared handler state.

use pixsync_db::MetadataIndex;
use pixsync_ingest::Coordinator;
use pixsync_notify::Notifier;
use pixsync_storage::BlobStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Default per-connection outbox size.
const DEFAULT_SUBSCRIBER_BUFFER: usize = 32;

pub struct AppState {
    pub index: Arc<dyn MetadataIndex>,
    pub store: Arc<dyn BlobStore>,
    pub coordinator: Coordinator,
    pub notifier: Notifier,
    /// Frames queued per WebSocket before the peer counts as stalled.
    pub subscriber_buffer: usize,
    /// Local blob root served under `/static`.
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        index: Arc<dyn MetadataIndex>,
        store: Arc<dyn BlobStore>,
        coordinator: Coordinator,
        notifier: Notifier,
    ) -> Self {
        Self {
            index,
            store,
            coordinator,
            notifier,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            static_dir: None,
        }
    }

    pub fn with_subscriber_buffer(mut self, size: usize) -> Self {
        self.subscriber_buffer = size.max(1);
        self
    }

    /// Serve the files of a local blob store, so its locators resolve.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }
}
