//! HTTP-facing error taxonomy. Every fallible handler boundary maps to one
//! of these variants, which in turn map to a status code and a stable
//! machine-readable `code` field in the JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid bearer token")]
    Auth,

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("cluster not found: {0}")]
    ClusterNotFound(uuid::Uuid),

    #[error("unrecognized cluster status: {0}")]
    InvalidStatus(String),

    #[error("batch of {received} records exceeds the limit of {limit}")]
    BatchTooLarge { limit: usize, received: usize },

    #[error("store error: {0}")]
    Store(#[from] xcluster_store::StoreError),

    #[error("worker queue overflow")]
    QueueOverflow,
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            Self::Auth => "auth_error",
            Self::UnknownService(_) => "unknown_service",
            Self::ClusterNotFound(_) => "cluster_not_found",
            Self::InvalidStatus(_) => "invalid_status",
            Self::Store(_) => "store_error",
            Self::QueueOverflow => "queue_overflow",
            Self::BatchTooLarge { .. } => "batch_too_large",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::UnknownService(_) => StatusCode::NOT_FOUND,
            Self::ClusterNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::QueueOverflow => StatusCode::SERVICE_UNAVAILABLE,
            Self::BatchTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody { code: self.code(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}
