//! The metadata index: upsert, ordered query and a push-based change feed.

use crate::database::Database;
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use pixsync_core::{ChangeEvent, Channel, IngestRecord, RecordDraft};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Change events buffered per feed before a slow listener starts losing them.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// Document store holding one [`IngestRecord`] per `(channel, id)`.
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Insert or overwrite the record keyed by the draft's id.
    async fn upsert(&self, draft: RecordDraft) -> DbResult<IngestRecord>;

    /// Records of a channel ordered by store time, newest first.
    async fn query(&self, channel: Channel, limit: Option<usize>) -> DbResult<Vec<IngestRecord>>;

    async fn get(&self, channel: Channel, id: &str) -> DbResult<Option<IngestRecord>>;

    /// Feed of changes for one channel, or for every channel when `None`.
    fn subscribe(&self, channel: Option<Channel>) -> ChangeFeed;
}

/// Receiving end of an index change subscription.
pub struct ChangeFeed {
    channel: Option<Channel>,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeFeed {
    /// Wait for the next change matching this feed's channel.
    ///
    /// Returns `None` once the index is dropped.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.channel.map_or(true, |c| c == event.channel) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Change listener lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Run `on_change` for every change on its own task, away from the writers.
    pub fn spawn<F, Fut>(mut self, mut on_change: F) -> JoinHandle<()>
    where
        F: FnMut(ChangeEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        tokio::spawn(async move {
            while let Some(event) = self.recv().await {
                on_change(event).await;
            }
            debug!("Change feed closed");
        })
    }
}

/// [`MetadataIndex`] backed by the SQLite [`Database`].
///
/// Writes are serialized together with their change events, so listeners
/// see changes in commit order.
#[derive(Clone)]
pub struct SqliteIndex {
    db: Database,
    changes: broadcast::Sender<ChangeEvent>,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteIndex {
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            db,
            changes,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl MetadataIndex for SqliteIndex {
    async fn upsert(&self, draft: RecordDraft) -> DbResult<IngestRecord> {
        let db = self.db.clone();
        let changes = self.changes.clone();
        let write_lock = Arc::clone(&self.write_lock);

        let record = tokio::task::spawn_blocking(move || {
            let _guard = write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let (record, kind) = db.upsert_record(&draft)?;
            debug!("Indexed {} in {} ({})", record.id, record.channel, kind);
            // Nobody listening is fine; sending never waits on receivers.
            let _ = changes.send(ChangeEvent::new(kind, record.clone()));
            Ok::<_, DbError>(record)
        })
        .await??;

        Ok(record)
    }

    async fn query(&self, channel: Channel, limit: Option<usize>) -> DbResult<Vec<IngestRecord>> {
        let db = self.db.clone();
        let records = tokio::task::spawn_blocking(move || db.list_records(channel, limit)).await??;
        Ok(records)
    }

    async fn get(&self, channel: Channel, id: &str) -> DbResult<Option<IngestRecord>> {
        let db = self.db.clone();
        let id = id.to_string();
        let record = tokio::task::spawn_blocking(move || db.get_record(channel, &id)).await??;
        Ok(record)
    }

    fn subscribe(&self, channel: Option<Channel>) -> ChangeFeed {
        ChangeFeed {
            channel,
            receiver: self.changes.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixsync_core::ChangeKind;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn index() -> SqliteIndex {
        SqliteIndex::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_query_empty_channel_is_ok() {
        let index = index();
        assert!(index.query(Channel::Original, Some(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_filters_by_channel() {
        let index = index();
        let mut original = index.subscribe(Some(Channel::Original));
        let mut everything = index.subscribe(None);

        index
            .upsert(RecordDraft::new(Channel::AIService, "x.png", "u1"))
            .await
            .unwrap();
        index
            .upsert(RecordDraft::new(Channel::Original, "y.png", "u2"))
            .await
            .unwrap();

        let event = original.recv().await.unwrap();
        assert_eq!(event.channel, Channel::Original);
        assert_eq!(event.kind, ChangeKind::DocumentAdded);
        assert_eq!(event.record.name, "y.png");

        assert_eq!(everything.recv().await.unwrap().channel, Channel::AIService);
        assert_eq!(everything.recv().await.unwrap().channel, Channel::Original);
    }

    #[tokio::test]
    async fn test_reupsert_reports_update() {
        let index = index();
        let mut feed = index.subscribe(Some(Channel::Original));

        let draft = RecordDraft::new(Channel::Original, "photo1.png", "u");
        index.upsert(draft.clone()).await.unwrap();
        index.upsert(draft).await.unwrap();

        assert_eq!(feed.recv().await.unwrap().kind, ChangeKind::DocumentAdded);
        assert_eq!(feed.recv().await.unwrap().kind, ChangeKind::DocumentUpdated);
        assert_eq!(index.query(Channel::Original, None).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_are_announced_in_commit_order() {
        let index = index();
        let mut feed = index.subscribe(Some(Channel::Original));

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let index = index.clone();
                tokio::spawn(async move {
                    let draft = RecordDraft::new(Channel::Original, "photo1.png", "u")
                        .with_checksum(format!("v{}", i));
                    index.upsert(draft).await.unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let mut events = Vec::new();
        for _ in 0..16 {
            events.push(feed.recv().await.unwrap());
        }
        assert_eq!(events[0].kind, ChangeKind::DocumentAdded);
        assert!(events[1..].iter().all(|e| e.kind == ChangeKind::DocumentUpdated));

        // The last change announced is what the index holds.
        let stored = index.get(Channel::Original, "Original_photo1_png").await.unwrap();
        assert_eq!(stored.as_ref(), Some(&events[15].record));
    }

    #[tokio::test]
    async fn test_slow_listener_does_not_block_writer() {
        let index = index();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _listener = index.subscribe(Some(Channel::Original)).spawn(move |event| {
            let tx = tx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let _ = tx.send(event.record.name);
            }
        });

        let started = std::time::Instant::now();
        for name in ["a.png", "b.png", "c.png"] {
            index
                .upsert(RecordDraft::new(Channel::Original, name, "u"))
                .await
                .unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(200));

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap());
        }
        assert_eq!(seen, vec!["a.png", "b.png", "c.png"]);
    }
}
