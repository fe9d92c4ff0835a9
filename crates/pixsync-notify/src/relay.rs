//! Bridge from the index change feed into the notifier.

use crate::hub::Notifier;
use pixsync_db::MetadataIndex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Forward every index change to the notifier until the index goes away.
///
/// This is the only path by which records reach subscribers, so every write
/// made through this process's index is announced exactly once. The feed is
/// in-process: writes from another `pixsync` process are not seen here.
pub fn spawn_relay(index: &dyn MetadataIndex, notifier: Notifier) -> JoinHandle<()> {
    index.subscribe(None).spawn(move |event| {
        let notifier = notifier.clone();
        async move {
            let delivery = notifier.publish(event.channel, &event).await;
            debug!(
                "Relayed {} for {} to {} subscribers",
                event.kind, event.record.id, delivery.delivered
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use pixsync_core::{Channel, RecordDraft};
    use pixsync_db::{Database, SqliteIndex};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_index_writes_reach_subscribers() {
        let index = SqliteIndex::new(Database::open_in_memory().unwrap());
        let notifier = Notifier::new();
        let (sink, mut rx) = ChannelSink::bounded(8);
        notifier.register(Arc::new(sink), Some(Channel::Photobooth)).await;

        let _relay = spawn_relay(&index, notifier.clone());

        index
            .upsert(RecordDraft::new(Channel::Original, "skip.png", "u"))
            .await
            .unwrap();
        index
            .upsert(RecordDraft::new(Channel::Photobooth, "booth.png", "u"))
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "document_added");
        assert_eq!(value["data"]["name"], "booth.png");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_writes_through_another_index_handle_are_not_relayed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixsync.db");
        let served = SqliteIndex::new(Database::open(&path).unwrap());
        let other_process = SqliteIndex::new(Database::open(&path).unwrap());

        let notifier = Notifier::new();
        let (sink, mut rx) = ChannelSink::bounded(8);
        notifier.register(Arc::new(sink), None).await;
        let _relay = spawn_relay(&served, notifier.clone());

        other_process
            .upsert(RecordDraft::new(Channel::Original, "imported.png", "u"))
            .await
            .unwrap();
        served
            .upsert(RecordDraft::new(Channel::Original, "local.png", "u"))
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["data"]["name"], "local.png");
        assert!(rx.try_recv().is_err());

        // The record is still there for the next query.
        let records = served.query(Channel::Original, None).await.unwrap();
        assert_eq!(records.len(), 2);
    }
}
