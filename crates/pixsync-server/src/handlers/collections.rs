//! Read-only views of a channel.

use crate::error::ServerResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use pixsync_core::IngestRecord;
use pixsync_ingest::parse_channel;
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_LATEST_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Every record of a channel, newest first, optionally capped.
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ServerResult<Json<Vec<IngestRecord>>> {
    let channel = parse_channel(&channel)?;
    let records = state.index.query(channel, query.limit).await?;
    Ok(Json(records))
}

pub async fn latest_records(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ServerResult<Json<Vec<IngestRecord>>> {
    let channel = parse_channel(&channel)?;
    let limit = query.limit.unwrap_or(DEFAULT_LATEST_LIMIT);
    let records = state.index.query(channel, Some(limit)).await?;
    Ok(Json(records))
}

/// Locators of a channel's records, newest first.
pub async fn list_urls(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> ServerResult<Json<Vec<String>>> {
    let channel = parse_channel(&channel)?;
    let records = state.index.query(channel, None).await?;
    Ok(Json(records.into_iter().map(|r| r.url).collect()))
}
