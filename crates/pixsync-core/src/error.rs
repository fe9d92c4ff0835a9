//! Error types for Pixsync.

use thiserror::Error;

/// Core error type for Pixsync domain operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using Pixsync's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
