//! Strategies for discovering inbox files.

use crate::error::IngestResult;
use crate::scanner::InboxScanner;
use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use pixsync_core::WatchedFile;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Full rescan period in event mode, picking up files whose ingestion failed.
const EVENT_MODE_RESCAN: Duration = Duration::from_secs(60);

/// Yields batches of candidate files for the coordinator.
///
/// Batches may repeat files that are still in flight; the coordinator
/// filters those out.
#[async_trait]
pub trait InboxSource: Send {
    /// Next batch, or `None` once the source has nothing more to give.
    async fn next_batch(&mut self) -> Option<Vec<WatchedFile>>;
}

#[async_trait]
impl<S: InboxSource + ?Sized> InboxSource for Box<S> {
    async fn next_batch(&mut self) -> Option<Vec<WatchedFile>> {
        (**self).next_batch().await
    }
}

/// Lists every inbox on a fixed interval.
pub struct PollingSource {
    scanner: Arc<InboxScanner>,
    ticker: Interval,
}

impl PollingSource {
    /// The first batch is produced immediately.
    pub fn new(scanner: Arc<InboxScanner>, period: Duration) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { scanner, ticker }
    }
}

#[async_trait]
impl InboxSource for PollingSource {
    async fn next_batch(&mut self) -> Option<Vec<WatchedFile>> {
        self.ticker.tick().await;
        Some(scan_all(&self.scanner).await)
    }
}

/// Full listing of every inbox, off the async workers.
async fn scan_all(scanner: &Arc<InboxScanner>) -> Vec<WatchedFile> {
    let scanner = Arc::clone(scanner);
    match tokio::task::spawn_blocking(move || scanner.scan_all()).await {
        Ok(files) => files,
        Err(e) => {
            error!("Inbox scan failed: {}", e);
            Vec::new()
        }
    }
}

/// Reacts to OS file notifications, debounced by a grace period.
///
/// Starts with a full scan so files dropped while the process was down are
/// not missed, and rescans periodically for files that failed earlier.
pub struct EventSource {
    scanner: Arc<InboxScanner>,
    // Dropping the debouncer stops the watch.
    _debouncer: Debouncer<RecommendedWatcher>,
    events: mpsc::UnboundedReceiver<DebounceEventResult>,
    rescan: Interval,
}

impl EventSource {
    /// Watch every inbox of `scanner`.
    ///
    /// A file is reported once no event touched it for `grace_period`, so
    /// a producer still writing it is not read half-way.
    pub fn new(scanner: Arc<InboxScanner>, grace_period: Duration) -> IngestResult<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(grace_period, move |result: DebounceEventResult| {
            // The receiver only goes away when the source is dropped.
            let _ = tx.send(result);
        })?;

        scanner.ensure_dirs()?;
        for (channel, dir) in scanner.inboxes() {
            info!("Watching {} inbox: {}", channel, dir.display());
            debouncer.watcher().watch(dir, RecursiveMode::NonRecursive)?;
        }

        let mut rescan = interval(EVENT_MODE_RESCAN);
        rescan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Self {
            scanner,
            _debouncer: debouncer,
            events,
            rescan,
        })
    }

    /// Pending files among the paths of one debounced batch.
    async fn files_from(scanner: Arc<InboxScanner>, result: DebounceEventResult) -> Vec<WatchedFile> {
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                error!("Watch error: {:?}", e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let paths: Vec<PathBuf> = events
            .into_iter()
            .map(|event| event.path)
            .filter(|path| seen.insert(path.clone()))
            .collect();

        let classified = tokio::task::spawn_blocking(move || {
            paths
                .into_iter()
                .filter_map(|path| {
                    let file = scanner.classify(&path);
                    if file.is_none() {
                        debug!("Ignoring event for {:?}", path);
                    }
                    file
                })
                .collect::<Vec<_>>()
        })
        .await;

        classified.unwrap_or_else(|e| {
            error!("Classifying watch events failed: {}", e);
            Vec::new()
        })
    }
}

#[async_trait]
impl InboxSource for EventSource {
    async fn next_batch(&mut self) -> Option<Vec<WatchedFile>> {
        loop {
            let event = tokio::select! {
                // The first tick fires at once and doubles as the startup scan.
                _ = self.rescan.tick() => None,
                result = self.events.recv() => Some(result),
            };

            match event {
                None => return Some(scan_all(&self.scanner).await),
                Some(None) => {
                    warn!("File watcher stopped");
                    return None;
                }
                Some(Some(result)) => {
                    let files = Self::files_from(Arc::clone(&self.scanner), result).await;
                    if !files.is_empty() {
                        return Some(files);
                    }
                }
            }
        }
    }
}

/// Hands out pre-set batches, for driving the coordinator without timers.
#[derive(Debug, Default)]
pub struct MemorySource {
    batches: VecDeque<Vec<WatchedFile>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, batch: Vec<WatchedFile>) {
        self.batches.push_back(batch);
    }
}

impl FromIterator<Vec<WatchedFile>> for MemorySource {
    fn from_iter<I: IntoIterator<Item = Vec<WatchedFile>>>(iter: I) -> Self {
        Self {
            batches: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl InboxSource for MemorySource {
    async fn next_batch(&mut self) -> Option<Vec<WatchedFile>> {
        self.batches.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::InboxFilter;
    use pixsync_core::Channel;

    #[tokio::test]
    async fn test_memory_source_drains_in_order() {
        let mut source: MemorySource = vec![
            vec![WatchedFile::new("/in/a.png", Channel::Original)],
            vec![],
        ]
        .into_iter()
        .collect();

        assert_eq!(source.next_batch().await.unwrap().len(), 1);
        assert!(source.next_batch().await.unwrap().is_empty());
        assert!(source.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn test_polling_source_rediscovers_remaining_files() {
        let root = tempfile::tempdir().unwrap();
        let scanner = Arc::new(
            InboxScanner::new(InboxFilter::default()).with_inbox(Channel::Original, root.path()),
        );
        let mut source = PollingSource::new(scanner, Duration::from_millis(10));

        assert!(source.next_batch().await.unwrap().is_empty());

        std::fs::write(root.path().join("photo1.png"), b"x").unwrap();
        assert_eq!(source.next_batch().await.unwrap().len(), 1);
        // Still on disk, so still reported.
        assert_eq!(source.next_batch().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_event_source_initial_scan() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("waiting.png"), b"x").unwrap();
        let scanner = Arc::new(
            InboxScanner::new(InboxFilter::default()).with_inbox(Channel::Original, root.path()),
        );

        let mut source = EventSource::new(scanner, Duration::from_millis(50)).unwrap();
        let batch = source.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].file_name(), Some("waiting.png"));
    }

    #[tokio::test]
    async fn test_event_source_reports_file_written_after_start() {
        let root = tempfile::tempdir().unwrap();
        let filter = InboxFilter {
            extensions: vec!["png".to_string()],
            ..Default::default()
        };
        let scanner = Arc::new(InboxScanner::new(filter).with_inbox(Channel::Original, root.path()));

        let mut source = EventSource::new(scanner, Duration::from_millis(50)).unwrap();
        assert!(source.next_batch().await.unwrap().is_empty());

        std::fs::write(root.path().join("upload.tmp"), b"partial").unwrap();
        std::fs::write(root.path().join("fresh.png"), b"x").unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(10), source.next_batch())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].file_name(), Some("fresh.png"));
        assert_eq!(batch[0].channel, Channel::Original);
    }
}
