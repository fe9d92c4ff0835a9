//! Live change subscriptions over WebSocket.
//!
//! Inbound messages are only keep-alives and are ignored. A connection is
//! unregistered when the peer closes it, when a write fails or stalls past
//! [`SEND_TIMEOUT`], or when the hub drops it for not keeping up.

use crate::error::ServerResult;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::{Sink, SinkExt, StreamExt};
use pixsync_core::Channel;
use pixsync_ingest::parse_channel;
use pixsync_notify::ChannelSink;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Longest a single frame write may block before the peer is dropped.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Subscribe to every channel.
pub async fn subscribe_all(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, None))
}

pub async fn subscribe_channel(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
    ws: WebSocketUpgrade,
) -> ServerResult<Response> {
    let channel = parse_channel(&channel)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, Some(channel))))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, channel: Option<Channel>) {
    let (sink, mut frames) = ChannelSink::bounded(state.subscriber_buffer);
    let id = state.notifier.register(Arc::new(sink), channel).await;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = frames.recv() => {
                // `None` once the hub has dropped this subscriber.
                let Some(frame) = frame else { break };
                if !forward(&mut sender, frame, SEND_TIMEOUT).await {
                    break;
                }
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    state.notifier.unregister(id).await;
    debug!("WebSocket subscriber {} disconnected", id);
}

/// Write one frame. `false` when the write failed or did not finish in time.
async fn forward<S>(sender: &mut S, frame: String, limit: Duration) -> bool
where
    S: Sink<Message> + Unpin,
{
    matches!(
        tokio::time::timeout(limit, sender.send(Message::Text(frame.into()))).await,
        Ok(Ok(()))
    )
}
