//! Request body decryption middleware
//!
//! Runs after gzip request decompression and before the JSON ingestion
//! handlers. A body that does not decrypt is rejected with 500, it is never
//! passed on as plaintext.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use tracing::{trace, warn};

use crate::api::error::ApiError;
use crate::crypto::PayloadDecryptor;

/// Largest encrypted body accepted
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

pub async fn decrypt_body(
    State(decryptor): State<Arc<PayloadDecryptor>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();

    let ciphertext = axum::body::to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("failed to read request body: {e}")))?;

    let plaintext = tokio::task::spawn_blocking(move || decryptor.decrypt(&ciphertext))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .inspect_err(|e| warn!("rejecting request to {}: {}", parts.uri, e))?;

    trace!("decrypted {} byte body", plaintext.len());
    parts.headers.remove(CONTENT_LENGTH);

    Ok(next.run(Request::from_parts(parts, Body::from(plaintext))).await)
}
