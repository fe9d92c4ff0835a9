//! The ingestion pipeline.
//!
//! Each file goes `Discovered -> Uploading -> Uploaded -> Indexed ->
//! Notified -> Cleaned`. The local file is only touched once its record is
//! in the index; any earlier failure leaves it in the inbox, where the next
//! scan finds it again. Both the blob put and the index upsert are
//! idempotent, so re-running a half-finished file is harmless.

use crate::error::{IngestError, IngestResult};
use crate::inflight::{InFlight, InFlightGuard};
use crate::source::InboxSource;
use crate::transform::{PassthroughTransform, TransformStage};
use bytes::Bytes;
use pixsync_config::Config;
use pixsync_core::{Channel, IngestRecord, RecordDraft, Stage, WatchedFile};
use pixsync_db::MetadataIndex;
use pixsync_storage::BlobStore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// What happens to a source file once its record is durable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CleanupMode {
    #[default]
    Delete,
    /// Move into `<dir>/<Channel>/<name>`.
    Archive(PathBuf),
}

/// Result of pushing one file through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Ingested(IngestRecord),
    /// The record was already indexed; only the local file was cleaned up.
    CleanedUp(PathBuf),
    /// Another task is handling this path right now.
    InFlight,
}

/// Parse a channel name coming from outside the pipeline.
pub fn parse_channel(name: &str) -> IngestResult<Channel> {
    Channel::parse(name).ok_or_else(|| IngestError::InvalidChannel(name.to_string()))
}

/// Destination names are a single path segment.
fn validate_name(name: &str) -> IngestResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(IngestError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Drives files from the inbox into the blob store and the index.
///
/// Subscribers are not notified from here: every successful upsert shows
/// up on the index change feed, which the notifier relays.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn BlobStore>,
    index: Arc<dyn MetadataIndex>,
    channels: Vec<Channel>,
    cleanup: CleanupMode,
    max_concurrent: usize,
    transforms: Option<Arc<TransformStage>>,
    in_flight: InFlight,
    /// Files whose record is durable but whose cleanup failed, by checksum.
    pending_cleanup: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl Coordinator {
    /// Coordinator accepting every channel, deleting sources after ingestion.
    pub fn new(store: Arc<dyn BlobStore>, index: Arc<dyn MetadataIndex>) -> Self {
        Self {
            store,
            index,
            channels: Channel::ALL.to_vec(),
            cleanup: CleanupMode::Delete,
            max_concurrent: 4,
            transforms: None,
            in_flight: InFlight::new(),
            pending_cleanup: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn BlobStore>,
        index: Arc<dyn MetadataIndex>,
    ) -> Self {
        let cleanup = match config.inbox.archive_dir() {
            Some(dir) => CleanupMode::Archive(dir),
            None => CleanupMode::Delete,
        };

        let mut coordinator = Self::new(store, index)
            .with_channels(config.inbox.channels.clone())
            .with_cleanup(cleanup)
            .with_max_concurrent(config.inbox.max_concurrent);

        if let Some(stage) = TransformStage::from_config(config, Arc::new(PassthroughTransform)) {
            coordinator = coordinator.with_transforms(stage);
        }
        coordinator
    }

    /// Restrict ingestion to these channels.
    pub fn with_channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupMode) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_transforms(mut self, stage: TransformStage) -> Self {
        self.transforms = Some(Arc::new(stage));
        self
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    fn check_channel(&self, channel: Channel) -> IngestResult<()> {
        if self.channels.contains(&channel) {
            Ok(())
        } else {
            Err(IngestError::InvalidChannel(channel.to_string()))
        }
    }

    /// Run one inbox file through the whole pipeline.
    pub async fn ingest_file(&self, file: WatchedFile) -> IngestResult<IngestOutcome> {
        let Some(guard) = self.in_flight.claim(&file.path) else {
            debug!("{} is already in flight", file.path.display());
            return Ok(IngestOutcome::InFlight);
        };
        self.process(file, guard).await
    }

    /// Store and index bytes that never sat in an inbox, such as an HTTP upload.
    pub async fn ingest_bytes(
        &self,
        channel: Channel,
        name: &str,
        data: Bytes,
    ) -> IngestResult<IngestRecord> {
        self.check_channel(channel)?;
        validate_name(name)?;
        let checksum = sha256_hex(&data);
        self.store_and_index(channel, name, data, checksum).await
    }

    /// Pull batches from `source` until it runs dry, then wait for the
    /// files still being processed.
    ///
    /// Failures are logged and never stop the loop.
    pub async fn run<S: InboxSource>(&self, mut source: S) {
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        info!(
            "Ingestion started for {:?} ({} at a time)",
            self.channels, self.max_concurrent
        );

        while let Some(batch) = source.next_batch().await {
            for file in batch {
                let Some(guard) = self.in_flight.claim(&file.path) else {
                    continue;
                };
                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                    break;
                };

                let this = self.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    this.process_logged(file, guard).await;
                });
            }
        }

        let _ = permits.acquire_many(self.max_concurrent as u32).await;
        info!("Ingestion stopped");
    }

    async fn process_logged(&self, file: WatchedFile, guard: InFlightGuard) {
        let channel = file.channel;
        let path = file.path.clone();

        match self.process(file, guard).await {
            Ok(IngestOutcome::Ingested(record)) => {
                info!(channel = %channel, path = %path.display(), id = %record.id, "Ingested");
            }
            Ok(IngestOutcome::CleanedUp(_)) => {
                info!(channel = %channel, path = %path.display(), "Finished pending cleanup");
            }
            Ok(IngestOutcome::InFlight) => {}
            Err(e) => {
                error!(
                    channel = %channel,
                    path = %path.display(),
                    stage = %e.stage(),
                    retry = e.is_retryable(),
                    error = %e,
                    "Failed to ingest file"
                );
            }
        }
    }

    async fn process(&self, file: WatchedFile, _guard: InFlightGuard) -> IngestResult<IngestOutcome> {
        let channel = file.channel;
        self.check_channel(channel)?;

        let name = file
            .file_name()
            .ok_or_else(|| IngestError::InvalidName(file.path.display().to_string()))?
            .to_string();
        validate_name(&name)?;

        debug!(channel = %channel, path = %file.path.display(), stage = %Stage::Discovered, "Reading");
        let data = Bytes::from(tokio::fs::read(&file.path).await?);
        let checksum = sha256_hex(&data);

        if self.take_pending_cleanup(&file.path, &checksum) {
            self.clean_up(&file, &name, &checksum).await?;
            return Ok(IngestOutcome::CleanedUp(file.path));
        }

        let record = self.store_and_index(channel, &name, data, checksum.clone()).await?;
        self.clean_up(&file, &name, &checksum).await?;
        Ok(IngestOutcome::Ingested(record))
    }

    async fn store_and_index(
        &self,
        channel: Channel,
        name: &str,
        data: Bytes,
        checksum: String,
    ) -> IngestResult<IngestRecord> {
        let key = channel.blob_key(name);

        debug!(channel = %channel, key = %key, stage = %Stage::Uploading, "Uploading");
        let locator = self
            .store
            .put(&key, data)
            .await
            .map_err(|source| IngestError::TransientStore {
                stage: Stage::Uploading,
                source,
            })?;

        debug!(channel = %channel, key = %key, stage = %Stage::Uploaded, "Indexing");
        let draft = RecordDraft::new(channel, name, locator.into_string()).with_checksum(checksum);
        let record = self
            .index
            .upsert(draft)
            .await
            .map_err(|source| IngestError::PartialWrite {
                key: key.clone(),
                source,
            })?;

        // The upsert already queued the change on the index feed.
        debug!(channel = %channel, id = %record.id, stage = %Stage::Notified, "Indexed");

        if let Some(stage) = &self.transforms {
            if let Err(e) = stage.run(&record, self.store.as_ref()).await {
                warn!(channel = %channel, key = %key, error = %e, "Transform failed");
            }
        }

        Ok(record)
    }

    /// Whether `path` only needs cleanup: it was indexed with this exact content before.
    fn take_pending_cleanup(&self, path: &Path, checksum: &str) -> bool {
        let mut pending = self
            .pending_cleanup
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match pending.remove(path) {
            Some(indexed) if indexed == checksum => true,
            Some(_) => {
                debug!("{} changed since it was indexed; ingesting again", path.display());
                false
            }
            None => false,
        }
    }

    async fn clean_up(&self, file: &WatchedFile, name: &str, checksum: &str) -> IngestResult<()> {
        let result = match &self.cleanup {
            CleanupMode::Delete => match tokio::fs::remove_file(&file.path).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
            CleanupMode::Archive(dir) => {
                archive(&file.path, &dir.join(file.channel.as_str()).join(name)).await
            }
        };

        match result {
            Ok(()) => {
                debug!(channel = %file.channel, path = %file.path.display(), stage = %Stage::Cleaned, "Cleaned");
                Ok(())
            }
            Err(source) => {
                self.pending_cleanup
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(file.path.clone(), checksum.to_string());
                Err(IngestError::Cleanup {
                    path: file.path.clone(),
                    source,
                })
            }
        }
    }
}

/// Move `from` to `to`, copying when a rename is not possible.
async fn archive(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}
