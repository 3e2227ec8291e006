//! Snapshot codec
//!
//! Serializes the complete metric set of a store into one JSON document and
//! restores it again:
//!
//! ```json
//! {"metrics": [{"id": "Alloc", "type": "gauge", "value": 12.5}, ...]}
//! ```
//!
//! Exports are written to a sibling temporary file and renamed over the
//! target, so a crash mid-export never leaves a truncated artifact behind.
//! Records are sorted by name, which makes two exports of an unchanged store
//! byte-identical.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use super::backend::MetricStore;
use super::error::StorageResult;
use crate::Metric;
use crate::wire::{SnapshotDocument, WireRecord};

async fn build_document(store: &dyn MetricStore) -> StorageResult<SnapshotDocument> {
    let metrics = store.get_all().await?;

    Ok(SnapshotDocument {
        metrics: metrics.values().map(WireRecord::from).collect(),
    })
}

/// Encode every metric of `store` into the snapshot document bytes
pub async fn encode(store: &dyn MetricStore) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(&build_document(store).await?)?)
}

/// Decode a snapshot document into metrics
///
/// Every record is validated before anything is returned; an unknown `type`
/// or a missing sample field fails the whole document.
pub fn decode(bytes: &[u8]) -> StorageResult<Vec<Metric>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let document: SnapshotDocument = serde_json::from_slice(bytes)?;

    document
        .metrics
        .iter()
        .map(|record| Metric::try_from(record).map_err(Into::into))
        .collect()
}

/// Write the full metric set of `store` to `path`, replacing any previous
/// artifact. Returns the number of exported metrics.
#[instrument(skip(store), fields(path = %path.display()))]
pub async fn export(store: &dyn MetricStore, path: &Path) -> StorageResult<usize> {
    let document = build_document(store).await?;
    let bytes = serde_json::to_vec(&document)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let staging = staging_path(path);
    tokio::fs::write(&staging, &bytes).await?;
    tokio::fs::rename(&staging, path).await?;

    debug!(
        "exported {} metrics ({} bytes)",
        document.metrics.len(),
        bytes.len()
    );
    Ok(document.metrics.len())
}

/// Restore the artifact at `path` into `store`. Returns the number of
/// restored metrics.
///
/// A missing or empty file restores nothing. Counters already present in the
/// store are accumulated, so this should only run against a freshly created
/// store before any other writer is active.
#[instrument(skip(store), fields(path = %path.display()))]
pub async fn import(store: &dyn MetricStore, path: &Path) -> StorageResult<usize> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("no snapshot found, starting empty");
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    let metrics = decode(&bytes)?;
    let count = metrics.len();

    store.batch_upsert(metrics).await?;

    info!("restored {} metrics from snapshot", count);
    Ok(count)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
