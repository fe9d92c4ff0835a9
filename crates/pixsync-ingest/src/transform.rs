//! Optional processing step between channels.
//!
//! A route `from -> to` takes every record newly indexed in `from`, runs
//! its blob through a [`Transform`] and drops the result into the inbox of
//! `to`, where it is ingested like any other file.

use crate::error::{IngestError, IngestResult};
use async_trait::async_trait;
use bytes::Bytes;
use pixsync_config::Config;
use pixsync_core::{Channel, IngestRecord};
use pixsync_storage::BlobStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix of files produced by a transform.
pub const OUTPUT_PREFIX: &str = "ai-processed-";

/// Opaque image processing step.
#[async_trait]
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, input: Bytes) -> IngestResult<Bytes>;
}

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransform;

#[async_trait]
impl Transform for PassthroughTransform {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn apply(&self, input: Bytes) -> IngestResult<Bytes> {
        Ok(input)
    }
}

struct Route {
    from: Channel,
    to: Channel,
    target_dir: PathBuf,
}

/// Set of routes sharing one transform.
pub struct TransformStage {
    transform: Arc<dyn Transform>,
    routes: Vec<Route>,
}

impl TransformStage {
    pub fn new(transform: Arc<dyn Transform>) -> Self {
        Self {
            transform,
            routes: Vec::new(),
        }
    }

    /// Send results for `from` into `target_dir`, the inbox of `to`.
    pub fn route(mut self, from: Channel, to: Channel, target_dir: impl Into<PathBuf>) -> Self {
        self.routes.push(Route {
            from,
            to,
            target_dir: target_dir.into(),
        });
        self
    }

    /// Routes from configuration, or `None` when there are none.
    pub fn from_config(config: &Config, transform: Arc<dyn Transform>) -> Option<Self> {
        if config.transform.routes.is_empty() {
            return None;
        }
        let stage = config
            .transform
            .routes
            .iter()
            .fold(Self::new(transform), |stage, r| {
                stage.route(r.from, r.to, config.inbox.inbox_dir(r.to))
            });
        Some(stage)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Run every route whose source is the record's channel.
    ///
    /// Returns the files written. Outputs of a transform are never fed
    /// back into another one, so routes cannot loop.
    pub async fn run(&self, record: &IngestRecord, store: &dyn BlobStore) -> IngestResult<Vec<PathBuf>> {
        if record.name.starts_with(OUTPUT_PREFIX) {
            debug!("Not transforming derived file {}", record.name);
            return Ok(Vec::new());
        }

        let mut written = Vec::new();
        for route in self.routes.iter().filter(|r| r.from == record.channel) {
            let key = record.channel.blob_key(&record.name);
            let input = store
                .get(&key)
                .await
                .map_err(|e| IngestError::Transform(format!("Failed to read {}: {}", key, e)))?;

            let output = self.transform.apply(input).await?;
            let path = route.target_dir.join(output_name(record));
            write_into_inbox(&path, &output).await?;

            info!(
                "{} transformed {} into {} ({})",
                self.transform.name(),
                key,
                path.display(),
                route.to
            );
            written.push(path);
        }
        Ok(written)
    }
}

/// `ai-processed-<source id>.png`
///
/// Fixed per source record, so running a route again for the same source
/// overwrites its earlier output instead of adding another one.
pub fn output_name(source: &IngestRecord) -> String {
    format!("{}{}.png", OUTPUT_PREFIX, source.id)
}

/// Write under a hidden name first; scanners skip hidden files.
async fn write_into_inbox(path: &Path, data: &[u8]) -> IngestResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| IngestError::Transform(format!("No parent for {}", path.display())))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| IngestError::Transform(format!("Bad output name {}", path.display())))?;

    tokio::fs::create_dir_all(parent).await?;
    let staging = parent.join(format!(".{}.part", file_name));
    if let Err(e) = tokio::fs::write(&staging, data).await {
        warn!("Failed to stage transform output {}: {}", staging.display(), e);
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e.into());
    }
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pixsync_storage::ObjectBlobStore;

    fn record(channel: Channel, name: &str) -> IngestRecord {
        IngestRecord {
            id: pixsync_core::document_id(&channel.blob_key(name)),
            name: name.to_string(),
            url: String::new(),
            channel,
            created_at: Utc::now(),
            checksum: None,
        }
    }

    #[test]
    fn test_output_name_follows_source_record() {
        let jpg = record(Channel::Original, "photo1.jpg");
        assert_eq!(output_name(&jpg), "ai-processed-Original_photo1_jpg.png");
        assert_eq!(output_name(&jpg), output_name(&jpg.clone()));
        assert_ne!(output_name(&jpg), output_name(&record(Channel::Original, "photo1.png")));
    }

    #[tokio::test]
    async fn test_rerun_overwrites_previous_output() {
        let out = tempfile::tempdir().unwrap();
        let store = ObjectBlobStore::in_memory("http://x");
        let stage = TransformStage::new(Arc::new(PassthroughTransform)).route(
            Channel::Original,
            Channel::AIService,
            out.path(),
        );
        let source = record(Channel::Original, "photo1.png");

        store
            .put("Original/photo1.png", Bytes::from_static(b"first"))
            .await
            .unwrap();
        let first = stage.run(&source, &store).await.unwrap();

        store
            .put("Original/photo1.png", Bytes::from_static(b"second"))
            .await
            .unwrap();
        let second = stage.run(&source, &store).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
        assert_eq!(std::fs::read(&second[0]).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_route_matches_channel_exactly() {
        let out = tempfile::tempdir().unwrap();
        let store = ObjectBlobStore::in_memory("http://x");
        store
            .put("Original/photo1.png", Bytes::from_static(b"pixels"))
            .await
            .unwrap();
        store
            .put("Photobooth/booth.png", Bytes::from_static(b"booth"))
            .await
            .unwrap();

        let stage = TransformStage::new(Arc::new(PassthroughTransform)).route(
            Channel::Original,
            Channel::AIService,
            out.path(),
        );

        let written = stage
            .run(&record(Channel::Original, "photo1.png"), &store)
            .await
            .unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(std::fs::read(&written[0]).unwrap(), b"pixels");

        let skipped = stage
            .run(&record(Channel::Photobooth, "booth.png"), &store)
            .await
            .unwrap();
        assert!(skipped.is_empty());

        // No staging leftovers.
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_derived_files_are_not_transformed_again() {
        let out = tempfile::tempdir().unwrap();
        let store = ObjectBlobStore::in_memory("http://x");
        let stage = TransformStage::new(Arc::new(PassthroughTransform)).route(
            Channel::AIService,
            Channel::Original,
            out.path(),
        );

        let written = stage
            .run(&record(Channel::AIService, "ai-processed-Original_photo1_png.png"), &store)
            .await
            .unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_missing_blob_is_transform_error() {
        let out = tempfile::tempdir().unwrap();
        let store = ObjectBlobStore::in_memory("http://x");
        let stage = TransformStage::new(Arc::new(PassthroughTransform)).route(
            Channel::Original,
            Channel::AIService,
            out.path(),
        );

        let result = stage.run(&record(Channel::Original, "gone.png"), &store).await;
        assert!(matches!(result, Err(IngestError::Transform(_))));
    }
}
