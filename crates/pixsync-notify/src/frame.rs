//! Wire format of a change pushed to subscribers.

use pixsync_core::{ChangeEvent, Channel, IngestRecord};
use serde::Serialize;

/// `{ "type": ..., "collection": ..., "data": ... }`, one text frame per event.
#[derive(Debug, Clone, Serialize)]
pub struct EventFrame<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub collection: Channel,
    pub data: &'a IngestRecord,
}

impl<'a> From<&'a ChangeEvent> for EventFrame<'a> {
    fn from(event: &'a ChangeEvent) -> Self {
        Self {
            kind: event.kind.as_str(),
            collection: event.channel,
            data: &event.record,
        }
    }
}

impl EventFrame<'_> {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pixsync_core::ChangeKind;

    #[test]
    fn test_frame_shape() {
        let event = ChangeEvent::new(
            ChangeKind::DocumentAdded,
            IngestRecord {
                id: "Original_photo1_png".to_string(),
                name: "photo1.png".to_string(),
                url: "http://localhost/Original/photo1.png".to_string(),
                channel: Channel::Original,
                created_at: Utc::now(),
                checksum: None,
            },
        );

        let value: serde_json::Value =
            serde_json::from_str(&EventFrame::from(&event).to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "document_added");
        assert_eq!(value["collection"], "Original");
        assert_eq!(value["data"]["id"], "Original_photo1_png");
    }
}
