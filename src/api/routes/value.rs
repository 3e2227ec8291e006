//! Read endpoints

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use super::update::response_record;
use crate::api::{ApiError, ApiResult, ApiState};
use crate::wire::{MetricQuery, WireRecord};
use crate::{Metric, MetricKind};

/// A metric stored under another kind counts as missing
async fn find(state: &ApiState, kind: MetricKind, name: &str) -> ApiResult<Metric> {
    let metric = state.store.get(name).await?;
    if metric.kind() != kind {
        return Err(ApiError::NotFound(format!("{kind} {name} not found")));
    }

    Ok(metric)
}

/// GET /value/{kind}/{name}
///
/// Gauges render with three decimals, counters as integers.
pub async fn value_by_path(
    State(state): State<ApiState>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<String> {
    let kind: MetricKind = kind.parse()?;
    let metric = find(&state, kind, &name).await?;

    Ok(metric.value.to_string())
}

/// POST /value/
pub async fn value_json(
    State(state): State<ApiState>,
    payload: Result<Json<MetricQuery>, JsonRejection>,
) -> ApiResult<Json<WireRecord>> {
    let Json(query) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let kind: MetricKind = query.kind.parse()?;
    let metric = find(&state, kind, &query.id).await?;

    Ok(Json(response_record(state.signer.as_ref(), &metric)))
}
