//! Point-in-time JSON snapshots of the index, one file per channel.
//!
//! Files live at `<root>/firestore/<Channel>.json` and hold the channel's
//! records in query order. Importing replays them through
//! [`MetadataIndex::upsert`] with their recorded timestamps, so running an
//! import twice, or against a populated index, leaves one record per id.

use crate::error::{DbError, DbResult};
use crate::index::MetadataIndex;
use pixsync_core::{Channel, IngestRecord, RecordDraft};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of a snapshot export or import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub channel: Channel,
    pub records: usize,
    pub path: PathBuf,
}

/// Reads and writes channel snapshot files under a root directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default snapshot file of a channel.
    pub fn path_for(&self, channel: Channel) -> PathBuf {
        self.root
            .join("firestore")
            .join(format!("{}.json", channel.as_str()))
    }

    /// Dump every record of `channel` to its snapshot file.
    pub async fn export(
        &self,
        index: &dyn MetadataIndex,
        channel: Channel,
    ) -> DbResult<SnapshotSummary> {
        let records = index.query(channel, None).await?;
        let path = self.path_for(channel);
        let contents = serde_json::to_vec_pretty(&records)?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&target, &contents)).await??;

        info!("Exported {} records of {} to {}", records.len(), channel, path.display());

        Ok(SnapshotSummary {
            channel,
            records: records.len(),
            path,
        })
    }

    /// Upsert every record from a snapshot file into the index.
    ///
    /// Reads the channel's default file when `file` is `None`.
    pub async fn import(
        &self,
        index: &dyn MetadataIndex,
        channel: Channel,
        file: Option<&Path>,
    ) -> DbResult<SnapshotSummary> {
        let path = file.map(Path::to_path_buf).unwrap_or_else(|| self.path_for(channel));

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DbError::NotFound(format!("Snapshot file {}", path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        let records: Vec<IngestRecord> = serde_json::from_slice(&contents)?;

        if let Some(stray) = records.iter().find(|r| r.channel != channel) {
            return Err(DbError::InvalidSnapshot(format!(
                "{} holds record {} of channel {}, expected {}",
                path.display(),
                stray.id,
                stray.channel,
                channel
            )));
        }

        let count = records.len();
        // Oldest first, so records sharing a timestamp keep their exported order.
        for record in records.into_iter().rev() {
            debug!("Restoring {} into {}", record.id, channel);
            index.upsert(RecordDraft::from(record)).await?;
        }

        info!("Imported {} records into {} from {}", count, channel, path.display());

        Ok(SnapshotSummary {
            channel,
            records: count,
            path,
        })
    }

    /// Export `channels` every `period`, starting one period from now.
    ///
    /// Failures are logged and the next round still runs.
    pub fn spawn_periodic(
        self,
        index: Arc<dyn MetadataIndex>,
        channels: Vec<Channel>,
        period: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for &channel in &channels {
                    if let Err(e) = self.export(index.as_ref(), channel).await {
                        warn!(channel = %channel, error = %e, "Periodic snapshot failed");
                    }
                }
            }
        })
    }
}

/// Write through a temporary sibling so readers never see a half-written snapshot.
fn write_atomically(path: &Path, contents: &[u8]) -> DbResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| DbError::Other(format!("Snapshot path has no parent: {}", path.display())))?;
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| DbError::Io(e.error))?;
    Ok(())
}
