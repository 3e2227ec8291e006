//! In-memory storage backend
//!
//! This backend keeps every metric in a map guarded by a read/write lock.
//! It's useful for:
//! - The collector's local store between two uploads
//! - Aggregators without a database (paired with file snapshots)
//! - Testing without database dependencies
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart unless snapshots are enabled
//! - **Single process**: The map is not shared between aggregator instances

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, instrument, trace};

use super::backend::{HealthStatus, MetricStore, merge_into};
use super::error::{StorageError, StorageResult};
use crate::{Metric, MetricKind, MetricSet};

/// In-memory storage backend
///
/// Reads proceed concurrently, writes are exclusive. The lock is never held
/// across an await point.
#[derive(Debug, Default)]
pub struct MemoryStore {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored metrics
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
    async fn get(&self, name: &str) -> StorageResult<Metric> {
        self.metrics
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn get_all(&self) -> StorageResult<MetricSet> {
        let metrics = self.metrics.read();
        Ok(metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric.clone()))
            .collect())
    }

    #[instrument(skip(self, metric), fields(name = %metric.name))]
    async fn upsert(&self, metric: Metric) -> StorageResult<Metric> {
        let mut metrics = self.metrics.write();
        let merged = merge_into(metrics.get(&metric.name), &metric)?;
        trace!("stored {} {}", merged.kind(), merged.name);
        metrics.insert(merged.name.clone(), merged.clone());
        Ok(merged)
    }

    #[instrument(skip(self, batch), fields(count = batch.len()))]
    async fn batch_upsert(&self, batch: Vec<Metric>) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut metrics = self.metrics.write();

        // Merge into a staging map first so a rejected element leaves the
        // store untouched.
        let mut staged: HashMap<String, Metric> = HashMap::with_capacity(batch.len());
        for metric in &batch {
            let stored = staged.get(&metric.name).or_else(|| metrics.get(&metric.name));
            let merged = merge_into(stored, metric)?;
            staged.insert(merged.name.clone(), merged);
        }

        debug!("applying batch of {} metrics", batch.len());
        metrics.extend(staged);
        Ok(())
    }

    async fn reset_counter(&self, name: &str) -> StorageResult<()> {
        let mut metrics = self.metrics.write();

        if let Some(stored) = metrics.get(name)
            && stored.kind() != MetricKind::Counter
        {
            return Err(StorageError::KindMismatch {
                name: name.to_string(),
                stored: stored.kind(),
                incoming: MetricKind::Counter,
            });
        }

        metrics.insert(name.to_string(), Metric::counter(name, 0));
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("total_metrics".to_string(), self.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
