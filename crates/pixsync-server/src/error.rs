//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pixsync_db::DbError;
use pixsync_ingest::IngestError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Index error: {0}")]
    Index(#[from] DbError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Ingest(e) => match e {
                IngestError::InvalidChannel(_) | IngestError::InvalidName(_) => {
                    StatusCode::BAD_REQUEST
                }
                IngestError::TransientStore { .. } => StatusCode::BAD_GATEWAY,
                IngestError::PartialWrite { .. } => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Index(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Index(_) | ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let invalid = ServerError::from(IngestError::InvalidChannel("Gallery".to_string()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let partial = ServerError::from(IngestError::PartialWrite {
            key: "Original/a.png".to_string(),
            source: DbError::Other("down".to_string()),
        });
        assert_eq!(partial.status(), StatusCode::SERVICE_UNAVAILABLE);

        let index = ServerError::from(DbError::Other("broken".to_string()));
        assert_eq!(index.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
