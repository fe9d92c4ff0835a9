//! Pixsync DB - The metadata index (SQLite document store) and its snapshots.

mod database;
mod error;
mod index;
mod migrations;
mod operations;
mod snapshot;

pub use database::Database;
pub use error::{DbError, DbResult};
pub use index::{ChangeFeed, MetadataIndex, SqliteIndex};
pub use snapshot::{SnapshotStore, SnapshotSummary};
