//! Connectivity checks.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Check {
    Ok,
    Error,
}

#[derive(Debug, Serialize)]
pub struct ChannelHealth {
    pub index: Check,
    pub storage: Check,
}

impl ChannelHealth {
    fn is_ok(&self) -> bool {
        self.index == Check::Ok && self.storage == Check::Ok
    }
}

/// Check the index and the blob store for every enabled channel.
///
/// Answers 503 when any check fails.
pub async fn health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<BTreeMap<String, ChannelHealth>>) {
    let mut report = BTreeMap::new();

    for &channel in state.coordinator.channels() {
        let index = match state.index.query(channel, Some(1)).await {
            Ok(_) => Check::Ok,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Index check failed");
                Check::Error
            }
        };
        let storage = match state.store.list(channel.as_str()).await {
            Ok(_) => Check::Ok,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Storage check failed");
                Check::Error
            }
        };
        report.insert(channel.to_string(), ChannelHealth { index, storage });
    }

    let status = if report.values().all(ChannelHealth::is_ok) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
