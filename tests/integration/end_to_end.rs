//! Collector and aggregator wired together over a real socket

use std::sync::Arc;

use metrics_relay::actors::{Collector, SnapshotHandle, Task, WorkerPool};
use metrics_relay::client::MetricsClient;
use metrics_relay::crypto::{PayloadEncryptor, Signer};
use metrics_relay::storage::{MemoryStore, MetricStore, snapshot};
use metrics_relay::{Metric, MetricValue, POLL_COUNT};

use crate::helpers::{self, server::spawn_with_store};

fn collector_for(address: &str, key: &str, encrypted: bool) -> (Arc<Collector>, Arc<dyn MetricStore>) {
    let encryptor =
        encrypted.then(|| PayloadEncryptor::new(helpers::test_rsa_key().to_public_key()));
    let client = MetricsClient::new(address, Signer::new(key), encryptor, true).unwrap();

    let local: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    (Arc::new(Collector::new(local.clone(), client)), local)
}

async fn run_cycle(collector: &Arc<Collector>, samples: usize) {
    let mut pool = WorkerPool::new(1, 16, collector.clone());
    for _ in 0..samples {
        pool.submit(Task::SampleRuntime).unwrap();
    }
    pool.submit(Task::SampleSystem).unwrap();
    pool.submit(Task::Upload).unwrap();
    pool.start();
    pool.stop().await;
}

#[tokio::test]
async fn test_poll_count_accumulates_across_uploads() {
    let aggregator: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let server = spawn_with_store(aggregator.clone(), Some("secret"), true).await;
    let (collector, local) = collector_for(&server.address(), "secret", true);

    run_cycle(&collector, 3).await;
    assert_eq!(
        aggregator.get(POLL_COUNT).await.unwrap(),
        Metric::counter(POLL_COUNT, 3)
    );

    run_cycle(&collector, 2).await;
    assert_eq!(
        aggregator.get(POLL_COUNT).await.unwrap(),
        Metric::counter(POLL_COUNT, 5)
    );

    assert_eq!(
        local.get(POLL_COUNT).await.unwrap(),
        Metric::counter(POLL_COUNT, 0)
    );
    assert!(matches!(
        aggregator.get("TotalMemory").await.unwrap().value,
        MetricValue::Gauge(_)
    ));
}

#[tokio::test]
async fn test_wrong_key_is_never_stored() {
    let aggregator: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let server = spawn_with_store(aggregator.clone(), Some("k1"), false).await;
    let (collector, local) = collector_for(&server.address(), "k2", false);

    run_cycle(&collector, 1).await;

    assert!(aggregator.get_all().await.unwrap().is_empty());
    // the failed cycle still resets the local counter
    assert_eq!(
        local.get(POLL_COUNT).await.unwrap(),
        Metric::counter(POLL_COUNT, 0)
    );
}

#[tokio::test]
async fn test_aggregator_restart_keeps_counters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");

    let first: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let snapshots = SnapshotHandle::spawn(first.clone(), path.clone(), None);
    let server = spawn_with_store(first, None, false).await;
    let (collector, _) = collector_for(&server.address(), "", false);

    run_cycle(&collector, 2).await;
    server.server.shutdown().await.unwrap();
    snapshots.shutdown().await.unwrap();

    let second: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    snapshot::import(second.as_ref(), &path).await.unwrap();
    let server = spawn_with_store(second.clone(), None, false).await;
    let (collector, _) = collector_for(&server.address(), "", false);

    run_cycle(&collector, 4).await;
    assert_eq!(
        second.get(POLL_COUNT).await.unwrap(),
        Metric::counter(POLL_COUNT, 6)
    );
}
