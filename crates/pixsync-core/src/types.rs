//! Core domain types for Pixsync.

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Deterministic document identifier derived from a blob key.
pub type DocumentId = String;

/// Logical partition of ingested objects.
///
/// Each channel maps 1:1 to an inbox directory, a blob key prefix and an
/// index collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    Original,
    AIService,
    Photobooth,
}

impl Channel {
    /// Every channel known to the system.
    pub const ALL: [Channel; 3] = [Channel::Original, Channel::AIService, Channel::Photobooth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Original => "Original",
            Channel::AIService => "AIService",
            Channel::Photobooth => "Photobooth",
        }
    }

    /// Look up a channel by its exact name.
    pub fn parse(s: &str) -> Option<Self> {
        Channel::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Blob key for a destination name inside this channel.
    pub fn blob_key(&self, name: &str) -> String {
        format!("{}/{}", self.as_str(), name)
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::parse(s).ok_or_else(|| Error::InvalidChannel(s.to_string()))
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the document id for a blob key.
///
/// `Original/photo1.png` becomes `Original_photo1_png`.
pub fn document_id(blob_key: &str) -> DocumentId {
    blob_key.replace('/', "_").replace('.', "_")
}

/// Timestamp of a record as handed to the index.
///
/// `ServerAssigned` is resolved by the index at write time; readers only
/// ever see plain timestamps on [`IngestRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordTime {
    #[default]
    ServerAssigned,
    At(DateTime<Utc>),
}

/// A record about to be written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub id: DocumentId,
    pub channel: Channel,
    pub name: String,
    pub url: String,
    pub checksum: Option<String>,
    pub time: RecordTime,
}

impl RecordDraft {
    /// Create a draft whose id is derived from the channel and destination name.
    pub fn new(channel: Channel, name: impl Into<String>, url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: document_id(&channel.blob_key(&name)),
            channel,
            name,
            url: url.into(),
            checksum: None,
            time: RecordTime::ServerAssigned,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_time(mut self, time: RecordTime) -> Self {
        self.time = time;
        self
    }
}

impl From<IngestRecord> for RecordDraft {
    fn from(record: IngestRecord) -> Self {
        Self {
            id: record.id,
            channel: record.channel,
            name: record.name,
            url: record.url,
            checksum: record.checksum,
            time: RecordTime::At(record.created_at),
        }
    }
}

/// One ingested object as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRecord {
    pub id: DocumentId,
    pub name: String,
    pub url: String,
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// A file sitting in a channel inbox, waiting to be ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFile {
    pub path: PathBuf,
    pub channel: Channel,
    pub first_seen_at: DateTime<Utc>,
}

impl WatchedFile {
    pub fn new(path: impl Into<PathBuf>, channel: Channel) -> Self {
        Self {
            path: path.into(),
            channel,
            first_seen_at: Utc::now(),
        }
    }

    /// Destination name of the file inside its channel.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Kind of change reported by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    DocumentAdded,
    DocumentUpdated,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::DocumentAdded => "document_added",
            ChangeKind::DocumentUpdated => "document_updated",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event broadcast to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub channel: Channel,
    pub kind: ChangeKind,
    pub record: IngestRecord,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, record: IngestRecord) -> Self {
        Self {
            channel: record.channel,
            kind,
            record,
        }
    }
}

/// Where a file is in its trip through the pipeline.
///
/// A file leaves its inbox only after reaching [`Stage::Indexed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovered,
    Uploading,
    Uploaded,
    Indexed,
    Notified,
    Cleaned,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discovered => "discovered",
            Stage::Uploading => "uploading",
            Stage::Uploaded => "uploaded",
            Stage::Indexed => "indexed",
            Stage::Notified => "notified",
            Stage::Cleaned => "cleaned",
        }
    }

    /// Whether the record is durable at this point, so the source may go.
    pub fn is_durable(&self) -> bool {
        *self >= Stage::Indexed
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(!Stage::Uploaded.is_durable());
        assert!(Stage::Indexed.is_durable());
        assert!(Stage::Discovered < Stage::Cleaned);
    }

    #[test]
    fn test_channel_parse_is_exact() {
        assert_eq!(Channel::parse("Original"), Some(Channel::Original));
        assert_eq!(Channel::parse("AIService"), Some(Channel::AIService));
        assert_eq!(Channel::parse("original"), None);
        assert_eq!(Channel::parse("Undatabase/Original"), None);
        assert!("Gallery".parse::<Channel>().is_err());
    }

    #[test]
    fn test_document_id() {
        assert_eq!(document_id("Original/photo1.png"), "Original_photo1_png");
        assert_eq!(
            RecordDraft::new(Channel::AIService, "a.b.jpg", "u").id,
            "AIService_a_b_jpg"
        );
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = IngestRecord {
            id: "Original_x_png".to_string(),
            name: "x.png".to_string(),
            url: "http://localhost/Original/x.png".to_string(),
            channel: Channel::Original,
            created_at: Utc::now(),
            checksum: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["channel"], "Original");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("checksum").is_none());
    }

    #[test]
    fn test_change_event_takes_channel_from_record() {
        let record = IngestRecord {
            id: "Photobooth_y_jpg".to_string(),
            name: "y.jpg".to_string(),
            url: "u".to_string(),
            channel: Channel::Photobooth,
            created_at: Utc::now(),
            checksum: None,
        };
        let event = ChangeEvent::new(ChangeKind::DocumentAdded, record);
        assert_eq!(event.channel, Channel::Photobooth);
        assert_eq!(
            serde_json::to_value(event.kind).unwrap(),
            serde_json::json!("document_added")
        );
    }
}
