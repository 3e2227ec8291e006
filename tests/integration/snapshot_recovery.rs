//! Snapshot export/import across store instances

use std::sync::Arc;

use metrics_relay::Metric;
use metrics_relay::actors::SnapshotHandle;
use metrics_relay::storage::{MemoryStore, MetricStore, snapshot};
use pretty_assertions::assert_eq;

use crate::helpers;

fn sample_metrics() -> Vec<Metric> {
    vec![
        Metric::gauge("Alloc", 12.5),
        Metric::gauge("RandomValue", 0.123456789),
        Metric::counter("PollCount", 42),
        Metric::counter("Requests", -3),
        Metric::gauge("CPUutilization1", 0.0),
    ]
}

#[tokio::test]
async fn test_round_trip_into_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");

    let original = MemoryStore::new();
    original.batch_upsert(sample_metrics()).await.unwrap();

    assert_eq!(snapshot::export(&original, &path).await.unwrap(), 5);

    let restored = MemoryStore::new();
    assert_eq!(snapshot::import(&restored, &path).await.unwrap(), 5);

    assert_eq!(
        restored.get_all().await.unwrap(),
        original.get_all().await.unwrap()
    );
}

#[tokio::test]
async fn test_repeated_export_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");

    let store = MemoryStore::new();
    store.batch_upsert(sample_metrics()).await.unwrap();

    snapshot::export(&store, &first).await.unwrap();
    snapshot::export(&store, &second).await.unwrap();

    assert_eq!(
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap()
    );
}

#[tokio::test]
async fn test_export_overwrites_previous_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("metrics.json");

    let store = MemoryStore::new();
    store.upsert(Metric::gauge("Alloc", 1.0)).await.unwrap();
    snapshot::export(&store, &path).await.unwrap();

    store.upsert(Metric::gauge("Alloc", 2.0)).await.unwrap();
    snapshot::export(&store, &path).await.unwrap();

    let restored = MemoryStore::new();
    snapshot::import(&restored, &path).await.unwrap();
    assert_eq!(restored.get("Alloc").await.unwrap(), Metric::gauge("Alloc", 2.0));

    // no staging file left behind
    let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
    assert_eq!(entries, 1);
}

#[tokio::test]
async fn test_restore_accumulates_counters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");

    let original = MemoryStore::new();
    original.upsert(Metric::counter("PollCount", 5)).await.unwrap();
    snapshot::export(&original, &path).await.unwrap();

    let target = MemoryStore::new();
    target.upsert(Metric::counter("PollCount", 1)).await.unwrap();
    snapshot::import(&target, &path).await.unwrap();

    assert_eq!(
        target.get("PollCount").await.unwrap(),
        Metric::counter("PollCount", 6)
    );
}

#[tokio::test]
async fn test_empty_artifact_restores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    std::fs::write(&path, "").unwrap();

    let store = MemoryStore::new();
    assert_eq!(snapshot::import(&store, &path).await.unwrap(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_unknown_type_aborts_import() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    std::fs::write(
        &path,
        r#"{"metrics":[{"id":"Alloc","type":"gauge","value":1.5},{"id":"Latency","type":"histogram","value":3.0}]}"#,
    )
    .unwrap();

    let store = MemoryStore::new();
    assert!(snapshot::import(&store, &path).await.is_err());
    assert!(store.is_empty());
}

#[cfg(feature = "storage-sqlite")]
#[tokio::test]
async fn test_sqlite_export_restores_into_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");

    let (_db_dir, sqlite) = helpers::sqlite_store().await;
    sqlite.batch_upsert(sample_metrics()).await.unwrap();
    snapshot::export(sqlite.as_ref(), &path).await.unwrap();

    let memory = MemoryStore::new();
    snapshot::import(&memory, &path).await.unwrap();

    assert_eq!(
        memory.get_all().await.unwrap(),
        sqlite.get_all().await.unwrap()
    );
}

#[tokio::test]
async fn test_restart_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");

    // first run: write, then shut down
    let (_, store) = helpers::memory_store().await;
    let snapshots = SnapshotHandle::spawn(store.clone(), path.clone(), None);
    store.upsert(Metric::counter("PollCount", 3)).await.unwrap();
    store.upsert(Metric::gauge("Alloc", 7.0)).await.unwrap();
    snapshots.shutdown().await.unwrap();

    // second run: restore, write more, shut down
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    snapshot::import(store.as_ref(), &path).await.unwrap();
    let snapshots = SnapshotHandle::spawn(store.clone(), path.clone(), None);
    store.upsert(Metric::counter("PollCount", 2)).await.unwrap();
    snapshots.shutdown().await.unwrap();

    // third run sees everything
    let store = MemoryStore::new();
    snapshot::import(&store, &path).await.unwrap();
    assert_eq!(
        store.get("PollCount").await.unwrap(),
        Metric::counter("PollCount", 5)
    );
    assert_eq!(store.get("Alloc").await.unwrap(), Metric::gauge("Alloc", 7.0));
}
