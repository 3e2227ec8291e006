//! API error types and conversions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::warn;

use crate::MetricError;
use crate::crypto::CryptoError;
use crate::storage::StorageError;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Malformed numeric value, missing field or kind conflict
    InvalidRequest(String),

    /// Integrity tag missing or not matching the payload
    IntegrityMismatch(String),

    /// Metric kind is neither gauge nor counter
    UnknownKind(String),

    /// Metric not found
    NotFound(String),

    /// Body could not be decrypted with the configured key
    DecryptionFailed(String),

    /// Storage operation failed
    StorageError(String),

    /// Internal server error
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) | ApiError::IntegrityMismatch(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownKind(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DecryptionFailed(_) | ApiError::StorageError(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            ApiError::InvalidRequest(msg)
            | ApiError::IntegrityMismatch(msg)
            | ApiError::UnknownKind(msg)
            | ApiError::NotFound(msg)
            | ApiError::DecryptionFailed(msg)
            | ApiError::StorageError(msg)
            | ApiError::Internal(msg) => msg,
        };

        if status.is_server_error() {
            warn!("request failed with {}: {}", status, error_message);
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<MetricError> for ApiError {
    fn from(err: MetricError) -> Self {
        match err {
            MetricError::UnknownKind(_) => ApiError::UnknownKind(err.to_string()),
            MetricError::InvalidValue(_) | MetricError::MissingField { .. } => {
                ApiError::InvalidRequest(err.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::NotFound(err.to_string()),
            StorageError::KindMismatch { .. }
            | StorageError::CounterOverflow(_)
            | StorageError::InvalidMetric(_) => ApiError::InvalidRequest(err.to_string()),
            _ => ApiError::StorageError(err.to_string()),
        }
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed(_) => ApiError::DecryptionFailed(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
