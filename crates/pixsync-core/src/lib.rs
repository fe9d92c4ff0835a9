//! Pixsync Core - Domain types shared by the ingestion pipeline, the index and the notifier.

mod error;
mod types;

pub use error::{Error, Result};
pub use types::*;
