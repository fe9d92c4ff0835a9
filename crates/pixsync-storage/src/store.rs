//! Storage abstraction trait

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use pixsync_core::Channel;
use std::path::Path;

/// Retrievable reference to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reject keys that could escape the channel prefix.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!("'{}' is not a relative key", key)));
    }
    if key.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(StorageError::InvalidKey(format!(
            "'{}' contains an empty or relative segment",
            key
        )));
    }
    Ok(())
}

/// Object store holding ingested blobs.
///
/// Implementations must make `put` all-or-nothing: a failed put leaves
/// nothing resolvable under the key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous object.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<Locator>;

    /// Fetch the object stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Keys stored under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Locator a key resolves to once stored.
    fn locator(&self, key: &str) -> Locator;

    /// Upload a local file to `{channel}/{name}`.
    async fn put_file(
        &self,
        local_path: &Path,
        channel: Channel,
        name: &str,
    ) -> StorageResult<Locator> {
        let data = tokio::fs::read(local_path).await?;
        self.put(&channel.blob_key(name), Bytes::from(data)).await
    }
}
