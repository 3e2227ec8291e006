//! Ingestion endpoints

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, ApiResult, ApiState};
use crate::crypto::Signer;
use crate::wire::{WireRecord, canonical_string};
use crate::{Metric, MetricKind, MetricValue};

/// Header carrying the integrity tag of a path-encoded update
pub const HASH_HEADER: &str = "Hash";

/// Wire record returned to clients, signed when a key is configured
pub(crate) fn response_record(signer: Option<&Signer>, metric: &Metric) -> WireRecord {
    match signer {
        Some(signer) => signer.signed_record(metric),
        None => WireRecord::from(metric),
    }
}

fn decode_record(signer: Option<&Signer>, record: &WireRecord) -> ApiResult<Metric> {
    let metric = Metric::try_from(record)?;

    if let Some(signer) = signer
        && !signer.verify_record(record, &metric)
    {
        warn!("integrity check failed for {}", record.id);
        return Err(ApiError::IntegrityMismatch(format!(
            "hash mismatch for metric {}",
            record.id
        )));
    }

    Ok(metric)
}

/// POST /update/{kind}/{name}/{value}
#[instrument(skip(state, headers))]
pub async fn update_by_path(
    State(state): State<ApiState>,
    Path((kind, name, value)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let kind: MetricKind = kind.parse()?;
    let metric = Metric {
        name,
        value: MetricValue::parse(kind, &value)?,
    };

    if let Some(signer) = &state.signer {
        let verified = headers
            .get(HASH_HEADER)
            .and_then(|tag| tag.to_str().ok())
            .is_some_and(|tag| signer.verify(tag, &canonical_string(&metric)));

        if !verified {
            warn!("integrity check failed for {}", metric.name);
            return Err(ApiError::IntegrityMismatch(format!(
                "hash mismatch for metric {}",
                metric.name
            )));
        }
    }

    state.store.upsert(metric).await?;
    Ok(StatusCode::OK)
}

/// POST /update/
///
/// Responds with the stored record after the update.
#[instrument(skip_all)]
pub async fn update_json(
    State(state): State<ApiState>,
    payload: Result<Json<WireRecord>, JsonRejection>,
) -> ApiResult<Json<WireRecord>> {
    let Json(record) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let metric = decode_record(state.signer.as_ref(), &record)?;

    let stored = state.store.upsert(metric).await?;
    Ok(Json(response_record(state.signer.as_ref(), &stored)))
}

/// POST /updates/
///
/// Every record is decoded and verified before the batch is applied; one bad
/// record rejects the whole batch.
#[instrument(skip_all)]
pub async fn update_batch(
    State(state): State<ApiState>,
    payload: Result<Json<Vec<WireRecord>>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(records) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    let metrics = records
        .iter()
        .map(|record| decode_record(state.signer.as_ref(), record))
        .collect::<ApiResult<Vec<_>>>()?;

    debug!("applying batch of {} metrics", metrics.len());
    state.store.batch_upsert(metrics).await?;

    Ok(StatusCode::OK)
}
