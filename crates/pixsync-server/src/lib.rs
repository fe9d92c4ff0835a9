//! Pixsync Server - HTTP and WebSocket surface.
//!
//! Routes:
//! - `GET  /api/collections/{channel}?limit=N` records, newest first
//! - `GET  /api/collections/{channel}/latest?limit=N` same, default 10
//! - `GET  /urls/{channel}` locators, newest first
//! - `POST /upload/{channel}` multipart `file`, ingested synchronously
//! - `POST /api/broadcast` change event pushed to every subscriber
//! - `GET  /health` per-channel index and storage checks
//! - `GET  /ws`, `GET /ws/{channel}` live change frames

mod error;
mod handlers;
mod routes;
mod server;
mod state;

pub use error::{ErrorResponse, ServerError, ServerResult};
pub use routes::router;
pub use server::serve;
pub use state::AppState;
