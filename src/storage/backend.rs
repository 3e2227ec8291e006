//! Metric store trait definition
//!
//! This module defines the core `MetricStore` trait that both the in-memory
//! and the relational backend implement with identical semantics.

use async_trait::async_trait;

use super::error::{StorageError, StorageResult};
use crate::{MergeConflict, Metric, MetricSet};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Owner of the canonical set of current metric values
///
/// ## Semantics
///
/// - `upsert` of a gauge replaces the stored value
/// - `upsert` of a counter adds the incoming delta to the stored total
///   (0 if absent)
/// - `batch_upsert` applies every element in order as one unit: concurrent
///   writers never observe half of a batch, and duplicate counter names
///   within one batch sum up
/// - the kind of a metric never changes; writing another kind under an
///   existing name fails with [`StorageError::KindMismatch`]
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared between the
/// worker pool, the HTTP handlers and the snapshot actor.
///
/// ## Error Handling
///
/// Backend unavailability surfaces as an error. Stores never retry on their
/// own; retry policy belongs to the caller.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Fetch a single metric by name
    async fn get(&self, name: &str) -> StorageResult<Metric>;

    /// Point-in-time copy of every stored metric
    async fn get_all(&self) -> StorageResult<MetricSet>;

    /// Insert or merge a single metric, returning the stored result
    async fn upsert(&self, metric: Metric) -> StorageResult<Metric>;

    /// Insert or merge a sequence of metrics as one unit
    async fn batch_upsert(&self, metrics: Vec<Metric>) -> StorageResult<()>;

    /// Set a counter back to zero, creating it if absent
    async fn reset_counter(&self, name: &str) -> StorageResult<()>;

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend
    /// is operational (e.g., ping database).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}

/// Merge `incoming` into the optionally stored metric, mapping conflicts to
/// storage errors. Used by both backends.
pub(crate) fn merge_into(stored: Option<&Metric>, incoming: &Metric) -> StorageResult<Metric> {
    let Some(stored) = stored else {
        return Ok(incoming.clone());
    };

    stored.merge(incoming).map_err(|conflict| match conflict {
        MergeConflict::KindMismatch {
            stored: stored_kind,
            incoming: incoming_kind,
        } => StorageError::KindMismatch {
            name: incoming.name.clone(),
            stored: stored_kind,
            incoming: incoming_kind,
        },
        MergeConflict::Overflow => StorageError::CounterOverflow(incoming.name.clone()),
    })
}
