//! Direct uploads, bypassing the inbox.

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::Json;
use bytes::Bytes;
use pixsync_core::Channel;
use pixsync_ingest::parse_channel;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: String,
    pub name: String,
    pub url: String,
    pub channel: Channel,
}

/// Read the single `file` field: its bare file name and contents.
async fn extract_file(mut multipart: Multipart) -> ServerResult<(String, Bytes)> {
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if file.is_some() {
            return Err(ServerError::BadRequest(
                "Send exactly one field named 'file'".to_string(),
            ));
        }

        // Clients may send a full path; only the last segment names the blob.
        let name = field
            .file_name()
            .and_then(|n| n.rsplit(['/', '\\']).next())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ServerError::BadRequest("File has no name".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read file data: {}", e)))?;

        file = Some((name, data));
    }

    file.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))
}

/// Store and index an uploaded file before answering.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    multipart: Multipart,
) -> ServerResult<Json<UploadResponse>> {
    let channel = parse_channel(&channel)?;
    let (name, data) = extract_file(multipart).await?;
    let size = data.len();

    let record = state.coordinator.ingest_bytes(channel, &name, data).await?;
    info!(channel = %channel, id = %record.id, size_bytes = size, "Upload ingested");

    Ok(Json(UploadResponse {
        id: record.id,
        name: record.name,
        url: record.url,
        channel: record.channel,
    }))
}
