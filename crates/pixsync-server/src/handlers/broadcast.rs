use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use pixsync_core::ChangeEvent;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub delivered: usize,
}

/// Push a change announced by an outside processor to every subscriber.
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChangeEvent>, JsonRejection>,
) -> ServerResult<Json<BroadcastResponse>> {
    let Json(event) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let delivery = state.notifier.publish_global(&event).await;
    Ok(Json(BroadcastResponse {
        delivered: delivery.delivered,
    }))
}
