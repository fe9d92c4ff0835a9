//! Database connection and pool management.

use crate::error::{DbError, DbResult};
use crate::migrations;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use tracing::info;

pub type ConnectionPool = Pool<SqliteConnectionManager>;
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Synchronous handle on the SQLite document store.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

/// Pooled connections for a file-backed index.
const FILE_POOL_SIZE: u32 = 8;

impl Database {
    /// Open the index at `path`, creating the file and schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening index database at: {}", path.display());

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )
        });
        Self::with_manager(manager, FILE_POOL_SIZE)
    }

    /// Private in-memory index, used by tests and dry runs.
    pub fn open_in_memory() -> DbResult<Self> {
        // Every in-memory connection is its own database.
        Self::with_manager(SqliteConnectionManager::memory(), 1)
    }

    fn with_manager(manager: SqliteConnectionManager, size: u32) -> DbResult<Self> {
        let pool = Pool::builder().max_size(size).build(manager)?;
        migrations::initialize_schema(&*pool.get()?)?;
        Ok(Self { pool })
    }

    pub fn conn(&self) -> DbResult<PooledConn> {
        self.pool.get().map_err(DbError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.db");
        Database::open(&path).unwrap();
        assert!(path.exists());
    }
}
