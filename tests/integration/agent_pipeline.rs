//! Collector pipeline against a mocked aggregator
//!
//! Drives the worker pool with the real `Collector` handler and checks what
//! arrives at the `/updates/` endpoint.

use std::sync::Arc;

use metrics_relay::actors::{Collector, Task, WorkerPool};
use metrics_relay::client::MetricsClient;
use metrics_relay::crypto::{PayloadDecryptor, PayloadEncryptor, Signer};
use metrics_relay::storage::{MemoryStore, MetricStore};
use metrics_relay::wire::WireRecord;
use metrics_relay::{Metric, POLL_COUNT};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers;

async fn mock_aggregator(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/updates/"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn run_pool(collector: Arc<Collector>, tasks: &[Task]) -> WorkerPool {
    // a single worker keeps the task order
    let mut pool = WorkerPool::new(1, 16, collector);
    for task in tasks {
        pool.submit(*task).unwrap();
    }
    pool.start();
    pool
}

fn poll_count(records: &[WireRecord]) -> Option<i64> {
    records
        .iter()
        .find(|record| record.id == POLL_COUNT)
        .and_then(|record| record.delta)
}

#[tokio::test]
async fn test_samples_are_uploaded_and_poll_count_reset() {
    let server = mock_aggregator(200).await;
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let client = MetricsClient::new(&server.uri(), None, None, false).unwrap();
    let collector = Arc::new(Collector::new(store.clone(), client));

    let pool = run_pool(
        collector,
        &[
            Task::SampleRuntime,
            Task::SampleRuntime,
            Task::SampleSystem,
            Task::SampleRuntime,
            Task::Upload,
        ],
    );
    pool.stop().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let records: Vec<WireRecord> = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(poll_count(&records), Some(3));
    assert!(records.iter().any(|record| record.id == "RandomValue"));
    assert!(records.iter().any(|record| record.id == "TotalMemory"));

    assert_eq!(
        store.get(POLL_COUNT).await.unwrap(),
        Metric::counter(POLL_COUNT, 0)
    );
}

#[tokio::test]
async fn test_rejected_upload_drops_poll_count() {
    let server = mock_aggregator(500).await;
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let client = MetricsClient::new(&server.uri(), None, None, false).unwrap();
    let collector = Arc::new(Collector::new(store.clone(), client));

    let pool = run_pool(
        collector,
        &[Task::SampleRuntime, Task::SampleRuntime, Task::Upload, Task::SampleRuntime],
    );
    pool.stop().await;

    // increments of the failed cycle are gone, the later sample counts from zero
    assert_eq!(
        store.get(POLL_COUNT).await.unwrap(),
        Metric::counter(POLL_COUNT, 1)
    );
}

#[tokio::test]
async fn test_empty_store_skips_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let client = MetricsClient::new(&server.uri(), None, None, false).unwrap();
    let collector = Arc::new(Collector::new(store, client));

    run_pool(collector, &[Task::Upload]).stop().await;
}

#[tokio::test]
async fn test_signed_encrypted_compressed_body() {
    let server = mock_aggregator(200).await;
    let key = helpers::test_rsa_key();
    let signer = Signer::new("k1").unwrap();

    let client = MetricsClient::new(
        &server.uri(),
        Some(signer.clone()),
        Some(PayloadEncryptor::new(key.to_public_key())),
        true,
    )
    .unwrap();
    let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
    let collector = Arc::new(Collector::new(store, client));

    run_pool(collector, &[Task::SampleRuntime, Task::Upload])
        .stop()
        .await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0]
            .headers
            .get("content-encoding")
            .and_then(|value| value.to_str().ok()),
        Some("gzip")
    );

    let mut ciphertext = Vec::new();
    std::io::Read::read_to_end(
        &mut flate2::read::GzDecoder::new(requests[0].body.as_slice()),
        &mut ciphertext,
    )
    .unwrap();

    let plaintext = PayloadDecryptor::new(key.clone())
        .decrypt(&ciphertext)
        .unwrap();
    let records: Vec<WireRecord> = serde_json::from_slice(&plaintext).unwrap();

    assert_eq!(poll_count(&records), Some(1));
    for record in &records {
        let metric = Metric::try_from(record).unwrap();
        assert!(signer.verify_record(record, &metric), "{} not signed", record.id);
    }
}
