//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::{expand_path, AppPaths};
use pixsync_core::Channel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub inbox: InboxConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,

    #[serde(default)]
    pub transform: TransformConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::default_config_string())?;
        Ok(())
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.inbox.channels.is_empty() {
            return Err(ConfigError::Invalid(
                "inbox.channels must name at least one channel".to_string(),
            ));
        }
        if self.inbox.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "inbox.poll_interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.inbox.max_concurrent == 0 {
            return Err(ConfigError::Invalid(
                "inbox.max_concurrent must be greater than zero".to_string(),
            ));
        }
        if self.notifier.subscriber_buffer == 0 {
            return Err(ConfigError::Invalid(
                "notifier.subscriber_buffer must be greater than zero".to_string(),
            ));
        }
        for route in &self.transform.routes {
            if route.from == route.to {
                return Err(ConfigError::Invalid(format!(
                    "transform route {} -> {} loops onto itself",
                    route.from, route.to
                )));
            }
            if !self.inbox.channels.contains(&route.to) {
                return Err(ConfigError::Invalid(format!(
                    "transform route target {} is not an enabled inbox channel",
                    route.to
                )));
            }
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.is_none() {
            return Err(ConfigError::Invalid(
                "storage.bucket is required for the s3 backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved path of the index database.
    pub fn database_path(&self, paths: &AppPaths) -> PathBuf {
        match (&self.index.database, &self.general.data_dir) {
            (Some(db), _) => expand_path(db),
            (None, Some(data_dir)) => expand_path(data_dir).join("index.db"),
            (None, None) => paths.database_file.clone(),
        }
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Pixsync Configuration
# Inbox folders -> object store -> index -> live subscribers

[general]
# Data directory for the index database
# data_dir = "~/.local/share/pixsync"

[inbox]
# Each channel watches <root>/<Channel>
root = "~/Pictures/pixsync/inbox"
channels = ["Original", "AIService"]

# "polling" lists every inbox on a fixed interval,
# "event" subscribes to filesystem notifications
mode = "polling"
poll_interval_seconds = 5

# Wait this long after a file appears before reading it (event mode)
grace_period_ms = 1000

# Only these extensions are ingested
extensions = ["png", "jpg", "jpeg", "gif", "webp", "bmp"]

# File patterns to ignore
ignore_patterns = [
    "*.tmp",
    "*.part",
    ".DS_Store",
    "._*",
]

# Move ingested files here instead of deleting them
# archive_dir = "~/Pictures/pixsync/archive"

# Files processed at the same time
max_concurrent = 4

[storage]
# "local", "memory" or "s3"
backend = "local"
root = "~/Pictures/pixsync/store"
# Local blobs are served by `pixsync serve` under /static
public_base_url = "http://localhost:8000/static"
# bucket = "gallery"
# region = "us-east-1"
# endpoint = "http://localhost:9000"

[index]
# database = "~/.local/share/pixsync/index.db"

[snapshot]
# Snapshots are written to <dir>/firestore/<Channel>.json
dir = "~/Pictures/pixsync/backup"
# Periodic export interval, 0 disables
interval_seconds = 300

[server]
bind = "0.0.0.0:8000"
max_upload_bytes = 26214400

[notifier]
# Frames a subscriber may lag behind before it is dropped
subscriber_buffer = 32

[transform]
# routes = [{ from = "Original", to = "AIService" }]
routes = []
"#
        .to_string()
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
}

/// How inboxes are observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Polling,
    Event,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Polling => "polling",
            ScanMode::Event => "event",
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inbox watching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxConfig {
    pub root: String,
    pub channels: Vec<Channel>,
    pub mode: ScanMode,
    pub poll_interval_seconds: u64,
    pub grace_period_ms: u64,
    pub extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub archive_dir: Option<String>,
    pub max_concurrent: usize,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            root: "~/Pictures/pixsync/inbox".to_string(),
            channels: vec![Channel::Original, Channel::AIService],
            mode: ScanMode::Polling,
            poll_interval_seconds: 5,
            grace_period_ms: 1000,
            extensions: ["png", "jpg", "jpeg", "gif", "webp", "bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_patterns: vec![
                "*.tmp".to_string(),
                "*.part".to_string(),
                ".DS_Store".to_string(),
                "._*".to_string(),
            ],
            archive_dir: None,
            max_concurrent: 4,
        }
    }
}

impl InboxConfig {
    /// Directory watched for a channel.
    pub fn inbox_dir(&self, channel: Channel) -> PathBuf {
        expand_path(&self.root).join(channel.as_str())
    }

    pub fn archive_dir(&self) -> Option<PathBuf> {
        self.archive_dir.as_deref().map(expand_path)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Blob store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Memory,
    S3,
}

/// Blob store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub root: String,
    pub public_base_url: String,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: "~/Pictures/pixsync/store".to_string(),
            public_base_url: "http://localhost:8000/static".to_string(),
            bucket: None,
            region: None,
            endpoint: None,
        }
    }
}

impl StorageConfig {
    pub fn root_dir(&self) -> PathBuf {
        expand_path(&self.root)
    }
}

/// Metadata index settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub database: Option<String>,
}

/// Snapshot export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub dir: String,
    pub interval_seconds: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: "~/Pictures/pixsync/backup".to_string(),
            interval_seconds: 300,
        }
    }
}

impl SnapshotConfig {
    pub fn root_dir(&self) -> PathBuf {
        expand_path(&self.dir)
    }

    /// `None` when periodic export is disabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_seconds > 0).then(|| Duration::from_secs(self.interval_seconds))
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Change notifier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub subscriber_buffer: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 32,
        }
    }
}

/// A transform applied to files of one channel, producing files for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRoute {
    pub from: Channel,
    pub to: Channel,
}

/// Transform stage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub routes: Vec<TransformRoute>,
}
