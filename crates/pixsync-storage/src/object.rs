//! [`BlobStore`] on top of the `object_store` crate.
//!
//! The local backend stages each upload in a temporary file and renames it
//! into place, S3 PUTs are atomic per object, and the in-memory backend
//! swaps the whole value, so no backend exposes a partial object.

use crate::error::{StorageError, StorageResult};
use crate::store::{validate_key, BlobStore, Locator};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use pixsync_config::{StorageBackend, StorageConfig};
use std::sync::Arc;
use std::time::Instant;

/// Blob store backed by any [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
    backend: StorageBackend,
}

impl ObjectBlobStore {
    /// Blobs as files under `root`, served from `public_base_url`.
    pub fn local(root: impl AsRef<std::path::Path>, public_base_url: impl Into<String>) -> StorageResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let store = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            store: Arc::new(store),
            public_base_url: public_base_url.into(),
            backend: StorageBackend::Local,
        })
    }

    /// Process-local store, mostly for tests and dry runs.
    pub fn in_memory(public_base_url: impl Into<String>) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            public_base_url: public_base_url.into(),
            backend: StorageBackend::Memory,
        }
    }

    /// S3 or an S3-compatible endpoint (MinIO, a storage emulator).
    pub fn s3(
        bucket: &str,
        region: Option<&str>,
        endpoint: Option<&str>,
        public_base_url: Option<&str>,
    ) -> StorageResult<Self> {
        let region = region.unwrap_or("us-east-1");
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket);

        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        // Path-style URLs for custom endpoints, virtual-hosted style for AWS.
        let public_base_url = match (public_base_url, endpoint) {
            (Some(url), _) => url.to_string(),
            (None, Some(endpoint)) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            (None, None) => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        };

        Ok(Self {
            store: Arc::new(store),
            public_base_url,
            backend: StorageBackend::S3,
        })
    }

    /// Build the backend selected in configuration.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        match config.backend {
            StorageBackend::Local => Self::local(config.root_dir(), config.public_base_url.clone()),
            StorageBackend::Memory => Ok(Self::in_memory(config.public_base_url.clone())),
            StorageBackend::S3 => {
                let bucket = config.bucket.as_deref().ok_or_else(|| {
                    StorageError::ConfigError("storage.bucket is required for s3".to_string())
                })?;
                Self::s3(
                    bucket,
                    config.region.as_deref(),
                    config.endpoint.as_deref(),
                    Some(config.public_base_url.as_str()).filter(|u| !u.is_empty()),
                )
            }
        }
    }

    pub fn backend(&self) -> StorageBackend {
        self.backend
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<Locator> {
        validate_key(key)?;
        let location = Path::from(key);
        let size = data.len();
        let start = Instant::now();

        self.store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Blob upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob upload successful"
        );

        Ok(self.locator(key))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        let location = Path::from(key);

        let result = self.store.get(&location).await.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let prefix = Path::from(prefix);
        let objects: Vec<_> = self
            .store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let mut keys: Vec<String> = objects.into_iter().map(|m| m.location.to_string()).collect();
        keys.sort();
        Ok(keys)
    }

    fn locator(&self, key: &str) -> Locator {
        Locator::new(format!("{}/{}", self.public_base_url.trim_end_matches('/'), key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixsync_core::Channel;

    #[tokio::test]
    async fn test_put_get_in_memory() {
        let store = ObjectBlobStore::in_memory("http://localhost:8000/static");

        let locator = store
            .put("Original/photo1.png", Bytes::from_static(b"png"))
            .await
            .unwrap();

        assert_eq!(locator.as_str(), "http://localhost:8000/static/Original/photo1.png");
        assert_eq!(store.get("Original/photo1.png").await.unwrap(), Bytes::from_static(b"png"));
    }

    #[tokio::test]
    async fn test_put_is_last_write_wins() {
        let store = ObjectBlobStore::in_memory("http://x");
        store.put("Original/a.png", Bytes::from_static(b"one")).await.unwrap();
        store.put("Original/a.png", Bytes::from_static(b"two")).await.unwrap();

        assert_eq!(store.get("Original/a.png").await.unwrap(), Bytes::from_static(b"two"));
        assert_eq!(store.list("Original").await.unwrap(), vec!["Original/a.png"]);
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let store = ObjectBlobStore::in_memory("http://x");
        assert!(matches!(
            store.get("Original/missing.png").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_put_file_and_list() {
        let root = tempfile::tempdir().unwrap();
        let inbox = tempfile::tempdir().unwrap();
        let store = ObjectBlobStore::local(root.path(), "http://localhost:8000/static").unwrap();

        let source = inbox.path().join("photo1.png");
        std::fs::write(&source, b"pixels").unwrap();

        let locator = store
            .put_file(&source, Channel::Original, "photo1.png")
            .await
            .unwrap();
        assert!(locator.as_str().ends_with("/Original/photo1.png"));
        assert_eq!(
            std::fs::read(root.path().join("Original").join("photo1.png")).unwrap(),
            b"pixels"
        );

        store
            .put("AIService/other.png", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert_eq!(store.list("Original").await.unwrap(), vec!["Original/photo1.png"]);
    }

    #[tokio::test]
    async fn test_put_file_missing_source_fails_cleanly() {
        let store = ObjectBlobStore::in_memory("http://x");
        let result = store
            .put_file(std::path::Path::new("/nonexistent/p.png"), Channel::Original, "p.png")
            .await;
        assert!(matches!(result, Err(StorageError::IoError(_))));
        assert!(store.list("Original").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_escaping_key() {
        let store = ObjectBlobStore::in_memory("http://x");
        let result = store.put("../etc/passwd", Bytes::new()).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
