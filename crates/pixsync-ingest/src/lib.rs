//! Pixsync Ingest - Inbox scanning and the ingestion pipeline.
//!
//! This crate provides:
//! - Inbox listing with extension and ignore filters
//! - Polling and filesystem-event discovery strategies
//! - The coordinator moving files into the blob store and the index
//! - Optional transform routes between channels

mod coordinator;
mod error;
mod inflight;
mod scanner;
mod source;
mod transform;

pub use coordinator::{parse_channel, CleanupMode, Coordinator, IngestOutcome};
pub use error::{IngestError, IngestResult};
pub use inflight::{InFlight, InFlightGuard};
pub use scanner::{InboxFilter, InboxScanner};
pub use source::{EventSource, InboxSource, MemorySource, PollingSource};
pub use transform::{output_name, PassthroughTransform, Transform, TransformStage, OUTPUT_PREFIX};
